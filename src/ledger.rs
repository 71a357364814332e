//! The contribution ledger.
//!
//! `Ledger` owns a record store and exposes every ledger operation. The
//! operations are spread over one `impl` block per concern:
//!
//! - `identity` - token validation, principal lookup, neighbor registration
//! - `projects` - Hackatime project dedup, attribution, sync
//! - `recorder` - stopwatch sessions and video commits
//! - `timeline` - merged local and GitHub commit feed
//! - `membership` - apps, join/leave/abandon, submissions
//! - `devlog` - posts and comments
//!
//! Each operation is an independent request: it reads what it needs, writes
//! record by record, and holds no state between calls. Nothing is atomic
//! across writes; a failure mid-operation leaves earlier writes in place.

use tracing::debug;

use crate::models::App;
use crate::store::{Formula, RecordStore, RecordStoreExt, patch};
use crate::timeline::TimelineOrder;
use crate::{Error, Result};

/// Tunables that change observable ledger behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerOptions {
    /// Ordering of `get_timeline` results
    pub timeline_order: TimelineOrder,
}

/// Denormalized back-reference arrays on an [`App`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLink {
    Neighbors,
    Commits,
    HackatimeProjects,
    Devlog,
    Submissions,
}

impl AppLink {
    /// Field name in the Apps collection.
    pub fn field(&self) -> &'static str {
        match self {
            AppLink::Neighbors => "neighbors",
            AppLink::Commits => "commits",
            AppLink::HackatimeProjects => "hackatimeProjects",
            AppLink::Devlog => "devlog",
            AppLink::Submissions => "submissions",
        }
    }

    pub fn ids<'a>(&self, app: &'a App) -> &'a [String] {
        match self {
            AppLink::Neighbors => &app.neighbors,
            AppLink::Commits => &app.commits,
            AppLink::HackatimeProjects => &app.hackatime_projects,
            AppLink::Devlog => &app.devlog,
            AppLink::Submissions => &app.submissions,
        }
    }
}

/// Ledger over a record store.
pub struct Ledger<S: RecordStore> {
    pub(crate) store: S,
    pub(crate) options: LedgerOptions,
}

impl<S: RecordStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, LedgerOptions::default())
    }

    pub fn with_options(store: S, options: LedgerOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Load an app by record id.
    pub(crate) fn app_by_id(&self, app_id: &str) -> Result<App> {
        self.store
            .fetch::<App>(app_id)?
            .ok_or_else(|| Error::AppNotFound(app_id.to_string()))
    }

    /// Load an app by exact name.
    pub(crate) fn app_by_name(&self, name: &str) -> Result<App> {
        self.store
            .find_first::<App>(&Formula::eq("name", name))?
            .ok_or_else(|| Error::AppNotFound(name.to_string()))
    }

    /// Append `id` to one of an app's back-reference arrays unless present.
    ///
    /// Reads the app fresh and writes the whole array back; a concurrent
    /// writer to the same array can be overwritten.
    pub(crate) fn append_app_link(&mut self, app_id: &str, link: AppLink, id: &str) -> Result<App> {
        let app = self.app_by_id(app_id)?;
        let current = link.ids(&app);
        if current.iter().any(|existing| existing == id) {
            return Ok(app);
        }

        let mut ids = current.to_vec();
        ids.push(id.to_string());
        debug!(app = app_id, field = link.field(), id, "linking record to app");
        self.store.patch_entity(app_id, patch(link.field(), &ids)?)
    }

    /// Overwrite one of an app's back-reference arrays.
    pub(crate) fn write_app_link(&mut self, app_id: &str, link: AppLink, ids: &[String]) -> Result<App> {
        self.store.patch_entity(app_id, patch(link.field(), ids)?)
    }
}

/// Reject empty required fields before touching the store.
pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}
