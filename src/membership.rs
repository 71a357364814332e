//! App membership lifecycle.
//!
//! A (neighbor, app) pair is either a member or not. Leaving cascades: every
//! back-reference set on the app drops the records owned by the leaver. The
//! cascade is a series of independent read-filter-write passes over one
//! snapshot of the app:
//!
//! 1. `neighbors` - drop the leaver
//! 2. `commits` - drop commits whose `neighbor` links the leaver
//! 3. `hackatimeProjects` - drop projects whose `neighbor` links the leaver
//! 4. `devlog` and `submissions` - same, for posts and submissions
//!
//! Records are unlinked, never deleted. Each pass writes the whole array
//! computed from the snapshot, so a concurrent append to the same array is
//! lost, and a failed pass leaves the earlier passes applied.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ledger::{AppLink, Ledger, require};
use crate::models::{App, AppSummary, Commit, HackatimeProject, Post, Submission, links_to};
use crate::store::{Entity, Formula, RecordStore, RecordStoreExt};
use crate::{Error, Result};

/// Records owned by one or more neighbors.
trait Owned: Entity {
    fn owners(&self) -> &[String];
}

impl Owned for Commit {
    fn owners(&self) -> &[String] {
        &self.neighbor
    }
}

impl Owned for HackatimeProject {
    fn owners(&self) -> &[String] {
        &self.neighbor
    }
}

impl Owned for Post {
    fn owners(&self) -> &[String] {
        &self.neighbor
    }
}

impl Owned for Submission {
    fn owners(&self) -> &[String] {
        &self.neighbor
    }
}

/// What a `leave` unlinked from the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveReport {
    pub app_id: String,
    pub neighbor_id: String,
    pub commits_unlinked: usize,
    pub projects_unlinked: usize,
    pub posts_unlinked: usize,
    pub submissions_unlinked: usize,
}

impl<S: RecordStore> Ledger<S> {
    /// Create an app. Names are unique; the optional creator becomes the first member.
    pub fn create_app(
        &mut self,
        name: &str,
        description: Option<String>,
        is_joinable: bool,
        is_hacktendo: bool,
        creator_token: Option<&str>,
    ) -> Result<App> {
        require("app name", name)?;
        let creator = creator_token.map(|token| self.resolve(token)).transpose()?;

        let name = name.trim();
        if self.app_name_taken(name)? {
            return Err(Error::Conflict(format!("An app named '{}' already exists", name)));
        }

        let mut app = App::new(name.to_string());
        app.description = description.filter(|d| !d.trim().is_empty());
        app.is_joinable = is_joinable;
        app.is_hacktendo = is_hacktendo;
        if let Some(creator) = &creator {
            app.neighbors.push(creator.id.clone());
        }

        let app = self.store.insert(&app)?;
        info!(app = %app.id, name = %app.name, "created app");
        Ok(app)
    }

    /// Look an app up by record id, falling back to its exact name.
    pub fn show_app(&self, key: &str) -> Result<AppSummary> {
        require("app", key)?;
        let key = key.trim();
        if let Some(app) = self.store.fetch::<App>(key)? {
            return Ok(app.summary());
        }
        self.app_by_name(key).map(|app| app.summary())
    }

    pub fn join(&mut self, token: &str, app_id: &str) -> Result<AppSummary> {
        require("app id", app_id)?;
        let neighbor = self.resolve(token)?;
        let app = self.app_by_id(app_id)?;

        if !app.is_joinable {
            return Err(Error::NotJoinable(app.id));
        }
        if app.has_member(&neighbor.id) {
            return Err(Error::AlreadyMember(app.id));
        }

        let app = self.append_app_link(&app.id, AppLink::Neighbors, &neighbor.id)?;
        info!(app = %app.id, neighbor = %neighbor.id, "joined app");
        Ok(app.summary())
    }

    /// Remove the caller from an app and prune their records from its back-references.
    pub fn leave(&mut self, token: &str, app_id: &str) -> Result<LeaveReport> {
        require("app id", app_id)?;
        let neighbor = self.resolve(token)?;
        let app = self.app_by_id(app_id)?;
        if !app.has_member(&neighbor.id) {
            return Err(Error::NotMember(app.id));
        }

        let leaver = neighbor.id.as_str();
        let remaining: Vec<String> = app
            .neighbors
            .iter()
            .filter(|id| id.as_str() != leaver)
            .cloned()
            .collect();
        self.write_app_link(&app.id, AppLink::Neighbors, &remaining)?;
        debug!(app = %app.id, neighbor = leaver, "removed membership");

        let report = LeaveReport {
            app_id: app.id.clone(),
            neighbor_id: neighbor.id.clone(),
            commits_unlinked: self.prune_owned::<Commit>(&app, AppLink::Commits, leaver)?,
            projects_unlinked: self
                .prune_owned::<HackatimeProject>(&app, AppLink::HackatimeProjects, leaver)?,
            posts_unlinked: self.prune_owned::<Post>(&app, AppLink::Devlog, leaver)?,
            submissions_unlinked: self
                .prune_owned::<Submission>(&app, AppLink::Submissions, leaver)?,
        };

        info!(
            app = %report.app_id,
            neighbor = %report.neighbor_id,
            commits = report.commits_unlinked,
            projects = report.projects_unlinked,
            posts = report.posts_unlinked,
            submissions = report.submissions_unlinked,
            "left app"
        );
        Ok(report)
    }

    /// One cascade pass: drop ids whose record is owned by `leaver`.
    ///
    /// Ids with no backing record stay; nothing attributes them to the leaver.
    fn prune_owned<E: Owned>(&mut self, snapshot: &App, link: AppLink, leaver: &str) -> Result<usize> {
        let linked = link.ids(snapshot);
        let records = self.store.find_all::<E>(&Formula::any_id(linked.iter().cloned()))?;

        let owned: Vec<&str> = records
            .iter()
            .filter(|r| links_to(r.owners(), leaver))
            .map(|r| r.id())
            .collect();
        if records.len() < linked.len() {
            warn!(
                app = %snapshot.id,
                field = link.field(),
                missing = linked.len() - records.len(),
                "back-reference ids without records"
            );
        }

        let kept: Vec<String> = linked
            .iter()
            .filter(|id| !owned.contains(&id.as_str()))
            .cloned()
            .collect();
        let unlinked = linked.len() - kept.len();

        self.write_app_link(&snapshot.id, link, &kept)?;
        debug!(app = %snapshot.id, field = link.field(), unlinked, "pruned back-references");
        Ok(unlinked)
    }

    /// Leave a Hacktendo game. Only membership is removed; nothing cascades.
    pub fn abandon(&mut self, token: &str, app_id: &str) -> Result<AppSummary> {
        require("app id", app_id)?;
        let neighbor = self.resolve(token)?;
        let app = self.app_by_id(app_id)?;

        if !app.is_hacktendo {
            return Err(Error::NotHacktendo(app.id));
        }
        if !app.has_member(&neighbor.id) {
            return Err(Error::NotMember(app.id));
        }

        let remaining: Vec<String> = app
            .neighbors
            .iter()
            .filter(|id| **id != neighbor.id)
            .cloned()
            .collect();
        let app = self.write_app_link(&app.id, AppLink::Neighbors, &remaining)?;
        info!(app = %app.id, neighbor = %neighbor.id, "abandoned game");
        Ok(app.summary())
    }

    /// Submit an app for review. Members only.
    pub fn submit(
        &mut self,
        token: &str,
        app_id: &str,
        code_url: &str,
        playable_url: &str,
        description: Option<String>,
    ) -> Result<Submission> {
        require("app id", app_id)?;
        require("code url", code_url)?;
        require("playable url", playable_url)?;

        let neighbor = self.resolve(token)?;
        let app = self.app_by_id(app_id)?;
        if !app.has_member(&neighbor.id) {
            return Err(Error::NotMember(app.id));
        }

        let submission = self.store.insert(&Submission {
            id: String::new(),
            neighbor: vec![neighbor.id.clone()],
            app: vec![app.id.clone()],
            code_url: code_url.trim().to_string(),
            playable_url: playable_url.trim().to_string(),
            description: description.filter(|d| !d.trim().is_empty()),
            created_at: Utc::now(),
        })?;

        self.append_app_link(&app.id, AppLink::Submissions, &submission.id)?;
        info!(submission = %submission.id, app = %app.id, "submitted app");
        Ok(submission)
    }

    /// True when an app with this name, trimmed and case-folded, exists.
    pub fn app_name_taken(&self, name: &str) -> Result<bool> {
        Ok(self
            .store
            .find_first::<App>(&Formula::normalized_eq("name", name))?
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Neighbor;
    use crate::store::{Collection, MemoryStore, patch};
    use crate::test_utils::{self, FaultyStore, InterleavedStore, ts};

    struct Scene {
        ledger: Ledger<MemoryStore>,
        app: App,
        ada: Neighbor,
        bob: Neighbor,
    }

    /// Ada and Bob both work on Gizmo: one session each, one post each,
    /// and a submission from Ada.
    fn scene() -> Scene {
        let mut ledger = test_utils::ledger();
        let app = test_utils::app(&mut ledger, "Gizmo");
        let ada = test_utils::neighbor(&mut ledger, "ada@example.com");
        let bob = test_utils::neighbor(&mut ledger, "bob@example.com");
        ledger.join(&ada.token, &app.id).unwrap();
        ledger.join(&bob.token, &app.id).unwrap();

        for (who, project) in [(&ada, "AdaWidget"), (&bob, "BobWidget")] {
            ledger
                .record_session(
                    &who.token,
                    project,
                    "Gizmo",
                    ts("2025-06-01T10:00:00Z"),
                    ts("2025-06-01T11:00:00Z"),
                    "v",
                )
                .unwrap();
            ledger
                .create_post(&who.token, "Gizmo", "demo", "booth", "progress")
                .unwrap();
        }
        ledger
            .submit(&ada.token, &app.id, "https://github.com/ada/gizmo", "https://play", None)
            .unwrap();

        let app = ledger.app_by_id(&app.id).unwrap();
        Scene { ledger, app, ada, bob }
    }

    fn owned_by<E: Owned>(ledger: &Ledger<MemoryStore>, ids: &[String], who: &str) -> usize {
        ids.iter()
            .filter_map(|id| ledger.store().fetch::<E>(id).unwrap())
            .filter(|r| links_to(r.owners(), who))
            .count()
    }

    #[test]
    fn test_create_app_rejects_duplicate_name() {
        let mut ledger = test_utils::ledger();
        test_utils::app(&mut ledger, "Gizmo");
        assert!(matches!(
            ledger.create_app(" gizmo ", None, true, false, None),
            Err(Error::Conflict(_))
        ));
        assert!(ledger.app_name_taken("GIZMO").unwrap());
    }

    #[test]
    fn test_create_app_with_creator_adds_member() {
        let mut ledger = test_utils::ledger();
        let ada = test_utils::neighbor(&mut ledger, "ada@example.com");
        let app = ledger
            .create_app("Gizmo", Some("A game".to_string()), false, true, Some(&ada.token))
            .unwrap();
        assert_eq!(app.neighbors, vec![ada.id]);
        assert!(!app.is_joinable);
        assert!(app.is_hacktendo);
    }

    #[test]
    fn test_show_app_by_id_or_name() {
        let mut ledger = test_utils::ledger();
        let app = test_utils::app(&mut ledger, "Gizmo");
        assert_eq!(ledger.show_app(&app.id).unwrap().name, "Gizmo");
        assert_eq!(ledger.show_app("Gizmo").unwrap().id, app.id);
        assert!(matches!(ledger.show_app("Nope"), Err(Error::AppNotFound(_))));
    }

    #[test]
    fn test_join_twice_is_conflict_without_duplicate() {
        let mut ledger = test_utils::ledger();
        let app = test_utils::app(&mut ledger, "Gizmo");
        let ada = test_utils::neighbor(&mut ledger, "ada@example.com");

        let summary = ledger.join(&ada.token, &app.id).unwrap();
        assert_eq!(summary.neighbors, vec![ada.id.clone()]);

        let err = ledger.join(&ada.token, &app.id).unwrap_err();
        assert!(matches!(err, Error::AlreadyMember(_)));
        assert_eq!(err.status(), 409);
        assert_eq!(ledger.app_by_id(&app.id).unwrap().neighbors, vec![ada.id]);
    }

    #[test]
    fn test_join_errors() {
        let mut ledger = test_utils::ledger();
        let closed = ledger.create_app("Closed", None, false, false, None).unwrap();
        let ada = test_utils::neighbor(&mut ledger, "ada@example.com");

        assert!(matches!(ledger.join(&ada.token, "recMissing"), Err(Error::AppNotFound(_))));
        assert!(matches!(ledger.join(&ada.token, &closed.id), Err(Error::NotJoinable(_))));
    }

    #[test]
    fn test_leave_prunes_only_leavers_records() {
        let Scene { mut ledger, app, ada, bob } = scene();
        assert_eq!(app.commits.len(), 2);
        assert_eq!(app.hackatime_projects.len(), 2);
        assert_eq!(app.devlog.len(), 2);
        assert_eq!(app.submissions.len(), 1);

        let report = ledger.leave(&ada.token, &app.id).unwrap();
        assert_eq!(report.commits_unlinked, 1);
        assert_eq!(report.projects_unlinked, 1);
        assert_eq!(report.posts_unlinked, 1);
        assert_eq!(report.submissions_unlinked, 1);

        let after = ledger.app_by_id(&app.id).unwrap();
        assert_eq!(after.neighbors, vec![bob.id.clone()]);
        assert_eq!(owned_by::<Commit>(&ledger, &after.commits, &ada.id), 0);
        assert_eq!(owned_by::<HackatimeProject>(&ledger, &after.hackatime_projects, &ada.id), 0);
        assert_eq!(owned_by::<Post>(&ledger, &after.devlog, &ada.id), 0);
        assert!(after.submissions.is_empty());

        // Bob's records are untouched
        assert_eq!(owned_by::<Commit>(&ledger, &after.commits, &bob.id), 1);
        assert_eq!(owned_by::<HackatimeProject>(&ledger, &after.hackatime_projects, &bob.id), 1);
        assert_eq!(owned_by::<Post>(&ledger, &after.devlog, &bob.id), 1);

        // Unlinked, not deleted
        assert_eq!(ledger.store().count(Collection::Commits), 2);
        assert_eq!(ledger.store().count(Collection::Posts), 2);
    }

    #[test]
    fn test_leave_two_commit_example() {
        let mut ledger = test_utils::ledger();
        let app = test_utils::app(&mut ledger, "X");
        let a = test_utils::neighbor(&mut ledger, "a@example.com");
        let b = test_utils::neighbor(&mut ledger, "b@example.com");
        ledger.join(&a.token, &app.id).unwrap();
        ledger.join(&b.token, &app.id).unwrap();

        let mut ids = Vec::new();
        for who in [&a, &b] {
            let commit = ledger
                .store_mut()
                .insert(&Commit {
                    id: String::new(),
                    message: "m".to_string(),
                    video_link: None,
                    github_link: None,
                    commit_time: ts("2025-06-01T10:00:00Z"),
                    sessions: vec![],
                    neighbor: vec![who.id.clone()],
                    app: vec![app.id.clone()],
                    hackatime_project: vec![],
                    commit_type: Default::default(),
                })
                .unwrap();
            ids.push(commit.id);
        }
        ledger.write_app_link(&app.id, AppLink::Commits, &ids).unwrap();

        ledger.leave(&a.token, &app.id).unwrap();
        assert_eq!(ledger.app_by_id(&app.id).unwrap().commits, vec![ids[1].clone()]);
    }

    #[test]
    fn test_leave_keeps_dangling_ids() {
        let Scene { mut ledger, app, ada, .. } = scene();
        let mut commits = app.commits.clone();
        commits.push("recGone".to_string());
        ledger.write_app_link(&app.id, AppLink::Commits, &commits).unwrap();

        ledger.leave(&ada.token, &app.id).unwrap();
        assert!(ledger.app_by_id(&app.id).unwrap().commits.contains(&"recGone".to_string()));
    }

    #[test]
    fn test_leave_requires_membership() {
        let mut ledger = test_utils::ledger();
        let app = test_utils::app(&mut ledger, "Gizmo");
        let ada = test_utils::neighbor(&mut ledger, "ada@example.com");
        assert!(matches!(ledger.leave(&ada.token, &app.id), Err(Error::NotMember(_))));
        assert!(matches!(ledger.leave(&ada.token, "recMissing"), Err(Error::AppNotFound(_))));
    }

    #[test]
    fn test_leave_loses_concurrent_commit_append() {
        let Scene { ledger, app, ada, .. } = scene();

        // Another request appends a commit while the cascade runs
        let app_id = app.id.clone();
        let store = InterleavedStore::new(ledger.into_store(), Collection::Apps, move |store| {
            let current: App = store.fetch(&app_id).unwrap().unwrap();
            let mut commits = current.commits;
            commits.push("recConcurrent".to_string());
            store
                .update(Collection::Apps, &app_id, patch("commits", &commits).unwrap())
                .unwrap();
        });
        let mut ledger = test_utils::ledger_over(store);

        ledger.leave(&ada.token, &app.id).unwrap();

        // Last writer wins: the cascade wrote its snapshot-based list
        let after = ledger.app_by_id(&app.id).unwrap();
        assert!(!after.commits.contains(&"recConcurrent".to_string()));
        assert_eq!(after.commits.len(), 1);
    }

    #[test]
    fn test_leave_failure_mid_cascade_is_not_rolled_back() {
        let Scene { ledger, app, ada, bob } = scene();

        // Updates: 1 neighbors, 2 commits, 3 projects (fails)
        let mut ledger = test_utils::ledger_over(FaultyStore::wrap(ledger.into_store()).fail_update_at(3));
        let err = ledger.leave(&ada.token, &app.id).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Storage);

        let after = ledger.app_by_id(&app.id).unwrap();
        assert_eq!(after.neighbors, vec![bob.id]);
        assert_eq!(after.commits.len(), 1);
        assert_eq!(after.hackatime_projects.len(), 2);
        assert_eq!(after.devlog.len(), 2);
        assert_eq!(after.submissions.len(), 1);
    }

    #[test]
    fn test_abandon_game_does_not_cascade() {
        let mut ledger = test_utils::ledger();
        let game = test_utils::game(&mut ledger, "Tetra");
        let ada = test_utils::neighbor(&mut ledger, "ada@example.com");
        ledger.join(&ada.token, &game.id).unwrap();
        ledger
            .record_session(
                &ada.token,
                "Tetra",
                "Tetra",
                ts("2025-06-01T10:00:00Z"),
                ts("2025-06-01T11:00:00Z"),
                "v",
            )
            .unwrap();

        let summary = ledger.abandon(&ada.token, &game.id).unwrap();
        assert!(summary.neighbors.is_empty());
        assert_eq!(summary.commit_count, 1);
        assert_eq!(summary.project_count, 1);

        assert!(matches!(ledger.abandon(&ada.token, &game.id), Err(Error::NotMember(_))));
    }

    #[test]
    fn test_abandon_requires_hacktendo() {
        let mut ledger = test_utils::ledger();
        let app = test_utils::app(&mut ledger, "Gizmo");
        let ada = test_utils::neighbor(&mut ledger, "ada@example.com");
        ledger.join(&ada.token, &app.id).unwrap();
        assert!(matches!(ledger.abandon(&ada.token, &app.id), Err(Error::NotHacktendo(_))));
        assert!(matches!(ledger.abandon(&ada.token, "recMissing"), Err(Error::AppNotFound(_))));
    }

    #[test]
    fn test_submit_members_only() {
        let mut ledger = test_utils::ledger();
        let app = test_utils::app(&mut ledger, "Gizmo");
        let ada = test_utils::neighbor(&mut ledger, "ada@example.com");

        assert!(matches!(
            ledger.submit(&ada.token, &app.id, "c", "p", None),
            Err(Error::NotMember(_))
        ));
        ledger.join(&ada.token, &app.id).unwrap();
        let submission = ledger
            .submit(&ada.token, &app.id, "c", "p", Some("first cut".to_string()))
            .unwrap();
        assert_eq!(ledger.app_by_id(&app.id).unwrap().submissions, vec![submission.id]);
    }
}
