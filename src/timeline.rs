//! Commit timeline: local video commits merged with GitHub history.
//!
//! Local commits are the neighbor's Commit rows on the app; GitHub commits
//! are fetched live for every linked project repository and never stored.
//! Both bounds of the window are exclusive, for local rows and remote
//! commits alike.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::github::{CommitQuery, SourceControl, parse_github_repo};
use crate::ledger::{Ledger, require};
use crate::models::{Commit, HackatimeProject, Session};
use crate::store::{Formula, RecordStore, RecordStoreExt};
use crate::{Error, Result};

/// Ordering of timeline entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineOrder {
    /// Stable sort by commit time
    #[default]
    Chronological,
    /// Local entries first, then GitHub entries project by project
    Source,
}

impl TimelineOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineOrder::Chronological => "chronological",
            TimelineOrder::Source => "source",
        }
    }
}

impl fmt::Display for TimelineOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimelineOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "chronological" => Ok(TimelineOrder::Chronological),
            "source" => Ok(TimelineOrder::Source),
            other => Err(Error::InvalidInput(format!(
                "Invalid timeline order '{}'. Valid values: chronological, source",
                other
            ))),
        }
    }
}

/// Projection shared by both kinds of timeline entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineCommit {
    /// Commit record id, or the SHA for GitHub commits
    pub id: String,
    pub message: String,
    pub link: Option<String>,
    /// Seconds of the linked session, if any
    pub duration: Option<i64>,
    pub commit_time: DateTime<Utc>,
}

/// One entry of the merged feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TimelineEntry {
    Video(TimelineCommit),
    Github(TimelineCommit),
}

impl TimelineEntry {
    pub fn commit(&self) -> &TimelineCommit {
        match self {
            TimelineEntry::Video(c) | TimelineEntry::Github(c) => c,
        }
    }

    pub fn commit_time(&self) -> DateTime<Utc> {
        self.commit().commit_time
    }

    pub fn is_github(&self) -> bool {
        matches!(self, TimelineEntry::Github(_))
    }
}

impl<S: RecordStore> Ledger<S> {
    /// Build the caller's commit feed for an app within `(start, end)`.
    ///
    /// Any GitHub failure, or a project link that is not a GitHub
    /// repository, fails the whole call.
    pub fn get_timeline(
        &self,
        token: &str,
        app_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        github_username: &str,
        source: &dyn SourceControl,
    ) -> Result<Vec<TimelineEntry>> {
        require("app name", app_name)?;
        require("github username", github_username)?;
        if end <= start {
            return Err(Error::InvalidInput(
                "endTime must be after startTime".to_string(),
            ));
        }

        let neighbor = self.resolve(token)?;
        let app = self.app_by_name(app_name)?;

        let window = Formula::And(vec![
            Formula::links("neighbor", &neighbor.id),
            Formula::links("app", &app.id),
            Formula::after("commitTime", start),
            Formula::before("commitTime", end),
        ]);
        debug!(formula = %window, "fetching local commits");

        let mut entries = Vec::new();
        for commit in self.store.find_all::<Commit>(&window)? {
            let duration = match commit.sessions.first() {
                Some(session_id) => self
                    .store
                    .fetch::<Session>(session_id)?
                    .map(|session| session.duration),
                None => None,
            };
            entries.push(TimelineEntry::Video(TimelineCommit {
                id: commit.id,
                message: commit.message,
                link: commit.github_link.or(commit.video_link),
                duration,
                commit_time: commit.commit_time,
            }));
        }
        let local = entries.len();

        for project_id in &app.hackatime_projects {
            let Some(project) = self.store.fetch::<HackatimeProject>(project_id)? else {
                continue;
            };
            let Some(link) = project.github_link.as_deref().filter(|l| !l.trim().is_empty()) else {
                continue;
            };
            let (owner, repo) = parse_github_repo(link)?;

            let query = CommitQuery {
                owner,
                repo,
                author: github_username.to_string(),
                since: start,
                until: end,
            };
            let remote = source.list_commits(&query)?;
            entries.extend(
                remote
                    .into_iter()
                    .filter(|c| c.committed_at > start && c.committed_at < end)
                    .map(|c| {
                        TimelineEntry::Github(TimelineCommit {
                            id: c.sha,
                            message: c.message,
                            link: Some(c.html_url),
                            duration: None,
                            commit_time: c.committed_at,
                        })
                    }),
            );
        }

        if self.options.timeline_order == TimelineOrder::Chronological {
            entries.sort_by_key(TimelineEntry::commit_time);
        }

        info!(
            app = %app.id,
            neighbor = %neighbor.id,
            local,
            github = entries.len() - local,
            order = %self.options.timeline_order,
            "built timeline"
        );
        Ok(entries)
    }
}
