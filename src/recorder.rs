//! Session and commit recording.
//!
//! Two entry points create progress records:
//! - `record_session`: a stopwatch interval, stored as a Session plus an
//!   `Approved` companion Commit
//! - `record_commit`: a one-shot video entry, stored as a `Pending` Commit
//!
//! Both link the new commit into the App's `commits` back-reference. Rows are
//! written one at a time; a failing write leaves the earlier rows in place.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::ledger::{AppLink, Ledger, require};
use crate::models::{Commit, CommitType, HackatimeProject, Session};
use crate::store::{Formula, RecordStore, RecordStoreExt};
use crate::{Error, Result};

/// Message of the commit that accompanies every stopwatch session.
pub const STOPWATCH_MESSAGE: &str = "Stopwatch session";

/// A recorded session with its companion commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedSession {
    pub session: Session,
    pub commit: Commit,
}

impl<S: RecordStore> Ledger<S> {
    /// Record a stopwatch interval on a project of the app named `app_name`.
    pub fn record_session(
        &mut self,
        token: &str,
        project_name: &str,
        app_name: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        video_url: &str,
    ) -> Result<RecordedSession> {
        require("project name", project_name)?;
        require("app name", app_name)?;
        require("video url", video_url)?;
        if end_time <= start_time {
            return Err(Error::InvalidInput(
                "endTime must be after startTime".to_string(),
            ));
        }

        let neighbor = self.resolve(token)?;
        let app = self.app_by_name(app_name)?;
        let project = self.ensure_project(project_name, &app.id, &neighbor.id)?;

        let session = self.store.insert(&Session {
            id: String::new(),
            neighbor: vec![neighbor.id.clone()],
            hackatime_project: vec![project.id.clone()],
            start_time,
            end_time,
            duration: (end_time - start_time).num_seconds(),
            approved: false,
        })?;

        let commit = self.store.insert(&Commit {
            id: String::new(),
            message: STOPWATCH_MESSAGE.to_string(),
            video_link: Some(video_url.trim().to_string()),
            github_link: None,
            commit_time: end_time,
            sessions: vec![session.id.clone()],
            neighbor: vec![neighbor.id.clone()],
            app: vec![app.id.clone()],
            hackatime_project: vec![project.id.clone()],
            commit_type: CommitType::Approved,
        })?;

        self.attribute_project(&project.id, &neighbor.id, &app.id)?;
        self.append_app_link(&app.id, AppLink::Commits, &commit.id)?;

        info!(
            session = %session.id,
            commit = %commit.id,
            app = %app.id,
            seconds = session.duration,
            "recorded stopwatch session"
        );
        Ok(RecordedSession { session, commit })
    }

    /// Record a video-backed commit awaiting review.
    pub fn record_commit(
        &mut self,
        token: &str,
        app_id: &str,
        project_name: &str,
        message: &str,
        video_url: &str,
        session_id: &str,
    ) -> Result<Commit> {
        require("app id", app_id)?;
        require("project name", project_name)?;
        require("commit message", message)?;
        require("video url", video_url)?;
        require("session", session_id)?;

        let neighbor = self.resolve(token)?;
        let app = self.app_by_id(app_id)?;
        let session = self
            .store
            .fetch::<Session>(session_id)?
            .ok_or_else(|| Error::NotFound(format!("Session not found: {}", session_id)))?;

        let project = self
            .store
            .find_first::<HackatimeProject>(&Formula::normalized_eq("name", project_name))?;

        let commit = self.store.insert(&Commit {
            id: String::new(),
            message: message.trim().to_string(),
            video_link: Some(video_url.trim().to_string()),
            github_link: None,
            commit_time: Utc::now(),
            sessions: vec![session.id],
            neighbor: vec![neighbor.id],
            app: vec![app.id.clone()],
            hackatime_project: project.map(|p| vec![p.id]).unwrap_or_default(),
            commit_type: CommitType::Pending,
        })?;

        self.append_app_link(&app.id, AppLink::Commits, &commit.id)?;
        info!(commit = %commit.id, app = %app.id, "recorded commit");
        Ok(commit)
    }
}
