//! Fixtures and store wrappers for ledger unit tests.

use chrono::{DateTime, Utc};
use std::cell::RefCell;

use crate::github::{CommitQuery, GitHubError, RemoteCommit, SourceControl};
use crate::hackatime::{HackatimeError, TimeTracker, TrackedProject};
use crate::ledger::Ledger;
use crate::models::{App, Neighbor};
use crate::store::{Collection, Fields, Formula, MemoryStore, Record, RecordStore};
use crate::{Error, Result};

/// A ledger over an empty in-memory store.
pub fn ledger() -> Ledger<MemoryStore> {
    Ledger::new(MemoryStore::new())
}

pub fn ledger_over<S: RecordStore>(store: S) -> Ledger<S> {
    Ledger::new(store)
}

/// Parse an RFC 3339 timestamp.
pub fn ts(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

/// Register a neighbor with a Slack id derived from the email.
pub fn neighbor<S: RecordStore>(ledger: &mut Ledger<S>, email: &str) -> Neighbor {
    let slack_id = format!("U{}", email.split('@').next().unwrap().to_uppercase());
    ledger
        .register_neighbor(email, None, Some(slack_id))
        .unwrap()
}

/// Create a joinable, non-Hacktendo app.
pub fn app<S: RecordStore>(ledger: &mut Ledger<S>, name: &str) -> App {
    ledger.create_app(name, None, true, false, None).unwrap()
}

/// Create a joinable Hacktendo game.
pub fn game<S: RecordStore>(ledger: &mut Ledger<S>, name: &str) -> App {
    ledger.create_app(name, None, true, true, None).unwrap()
}

/// Store wrapper that fails on demand.
pub struct FaultyStore {
    pub inner: MemoryStore,
    fail_reads: bool,
    fail_update_at: Option<usize>,
    updates: usize,
}

impl FaultyStore {
    pub fn wrap(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_reads: false,
            fail_update_at: None,
            updates: 0,
        }
    }

    /// A store whose every read fails.
    pub fn failing_reads() -> Self {
        let mut store = Self::wrap(MemoryStore::new());
        store.fail_reads = true;
        store
    }

    /// Fail the `n`-th update (1-based) and every update after it.
    pub fn fail_update_at(mut self, n: usize) -> Self {
        self.fail_update_at = Some(n);
        self
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads {
            return Err(Error::Storage("injected read failure".to_string()));
        }
        Ok(())
    }
}

impl RecordStore for FaultyStore {
    fn find(&self, collection: Collection, formula: &Formula) -> Result<Vec<Record>> {
        self.check_read()?;
        self.inner.find(collection, formula)
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        self.check_read()?;
        self.inner.get(collection, id)
    }

    fn create(&mut self, collection: Collection, fields: Fields) -> Result<Record> {
        self.inner.create(collection, fields)
    }

    fn update(&mut self, collection: Collection, id: &str, fields: Fields) -> Result<Record> {
        self.updates += 1;
        if self.fail_update_at.is_some_and(|n| self.updates >= n) {
            return Err(Error::Storage(format!(
                "injected failure on update #{}",
                self.updates
            )));
        }
        self.inner.update(collection, id, fields)
    }

    fn delete(&mut self, collection: Collection, id: &str) -> Result<()> {
        self.inner.delete(collection, id)
    }
}

type Hook = Box<dyn FnOnce(&mut MemoryStore)>;

/// Store wrapper that runs a "concurrent request" right before the first
/// update to a given collection.
pub struct InterleavedStore {
    pub inner: MemoryStore,
    trigger: Collection,
    hook: Option<Hook>,
}

impl InterleavedStore {
    pub fn new(inner: MemoryStore, trigger: Collection, hook: impl FnOnce(&mut MemoryStore) + 'static) -> Self {
        Self {
            inner,
            trigger,
            hook: Some(Box::new(hook)),
        }
    }
}

impl RecordStore for InterleavedStore {
    fn find(&self, collection: Collection, formula: &Formula) -> Result<Vec<Record>> {
        self.inner.find(collection, formula)
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        self.inner.get(collection, id)
    }

    fn create(&mut self, collection: Collection, fields: Fields) -> Result<Record> {
        self.inner.create(collection, fields)
    }

    fn update(&mut self, collection: Collection, id: &str, fields: Fields) -> Result<Record> {
        if collection == self.trigger {
            if let Some(hook) = self.hook.take() {
                hook(&mut self.inner);
            }
        }
        self.inner.update(collection, id, fields)
    }

    fn delete(&mut self, collection: Collection, id: &str) -> Result<()> {
        self.inner.delete(collection, id)
    }
}

/// In-memory source-control host. Like GitHub, `since`/`until` are inclusive.
#[derive(Default)]
pub struct FakeSourceControl {
    commits: Vec<(String, String, String, RemoteCommit)>,
    fail_repo: Option<String>,
    pub queries: RefCell<Vec<CommitQuery>>,
}

impl FakeSourceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commit(mut self, owner: &str, repo: &str, author: &str, sha: &str, message: &str, at: &str) -> Self {
        self.commits.push((
            owner.to_string(),
            repo.to_string(),
            author.to_string(),
            RemoteCommit {
                sha: sha.to_string(),
                message: message.to_string(),
                html_url: format!("https://github.com/{}/{}/commit/{}", owner, repo, sha),
                committed_at: ts(at),
            },
        ));
        self
    }

    /// Fail every query against `repo`.
    pub fn failing_on(mut self, repo: &str) -> Self {
        self.fail_repo = Some(repo.to_string());
        self
    }
}

impl SourceControl for FakeSourceControl {
    fn list_commits(&self, query: &CommitQuery) -> std::result::Result<Vec<RemoteCommit>, GitHubError> {
        self.queries.borrow_mut().push(query.clone());
        if self.fail_repo.as_deref() == Some(query.repo.as_str()) {
            return Err(GitHubError::HttpError("HTTP 500: boom".to_string()));
        }
        Ok(self
            .commits
            .iter()
            .filter(|(owner, repo, author, c)| {
                *owner == query.owner
                    && *repo == query.repo
                    && *author == query.author
                    && c.committed_at >= query.since
                    && c.committed_at <= query.until
            })
            .map(|(_, _, _, c)| c.clone())
            .collect())
    }
}

/// In-memory time tracker returning a fixed project list.
#[derive(Default)]
pub struct FakeTimeTracker {
    pub projects: Vec<TrackedProject>,
    pub fail: bool,
    pub calls: RefCell<Vec<String>>,
}

impl FakeTimeTracker {
    pub fn with_projects(projects: &[(&str, u64)]) -> Self {
        Self {
            projects: projects
                .iter()
                .map(|(name, secs)| TrackedProject {
                    name: name.to_string(),
                    total_seconds: *secs,
                })
                .collect(),
            ..Self::default()
        }
    }
}

impl TimeTracker for FakeTimeTracker {
    fn projects_since(
        &self,
        slack_id: &str,
        _since: DateTime<Utc>,
    ) -> std::result::Result<Vec<TrackedProject>, HackatimeError> {
        self.calls.borrow_mut().push(slack_id.to_string());
        if self.fail {
            return Err(HackatimeError::HttpError("HTTP 503: down".to_string()));
        }
        Ok(self.projects.clone())
    }
}
