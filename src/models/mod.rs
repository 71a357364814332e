//! Data models for ledger entities.
//!
//! This module defines the records the ledger reads and writes:
//! - `Neighbor` - A program participant, identified by a bearer token
//! - `App` - A participant-built project with its member set and back-references
//! - `HackatimeProject` - Local mirror of one externally tracked coding project
//! - `Session` - One measured work interval
//! - `Commit` - One attributable unit of logged progress
//! - `Post` / `Comment` - Devlog entries and their replies
//! - `Submission` - A YSWS-style submission of an app
//!
//! Linked fields are arrays of record ids, as the record store models them.
//! The `App` back-reference arrays are maintained by the ledger, never by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::{Collection, Entity};

/// Check whether a linked-record array references `id`.
pub fn links_to(ids: &[String], id: &str) -> bool {
    ids.iter().any(|linked| linked == id)
}

/// A program participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Neighbor {
    /// Store-assigned record id
    #[serde(default)]
    pub id: String,

    /// Signup email, unique per neighbor
    pub email: String,

    /// Bearer secret; the sole credential for every ledger call
    pub token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    /// Slack user id, also the user key on Hackatime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house: Option<String>,

    #[serde(default)]
    pub preferences: Vec<String>,
}

impl Neighbor {
    pub fn new(email: String, token: String) -> Self {
        Self {
            id: String::new(),
            email,
            token,
            full_name: None,
            slack_id: None,
            house: None,
            preferences: Vec::new(),
        }
    }
}

impl Entity for Neighbor {
    const COLLECTION: Collection = Collection::Neighbors;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A participant-built project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    /// Store-assigned record id
    #[serde(default)]
    pub id: String,

    /// Human key; lookups by name assume it is unique
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Member set: who may attribute time to this app
    #[serde(default)]
    pub neighbors: Vec<String>,

    /// Back-reference to Commit records
    #[serde(default)]
    pub commits: Vec<String>,

    /// Back-reference to HackatimeProject records
    #[serde(default)]
    pub hackatime_projects: Vec<String>,

    /// Back-reference to devlog Post records
    #[serde(default)]
    pub devlog: Vec<String>,

    /// Back-reference to Submission records
    #[serde(default)]
    pub submissions: Vec<String>,

    #[serde(default)]
    pub is_joinable: bool,

    /// Hacktendo games use the non-cascading abandon path
    #[serde(default)]
    pub is_hacktendo: bool,
}

impl App {
    pub fn new(name: String) -> Self {
        Self {
            id: String::new(),
            name,
            description: None,
            neighbors: Vec::new(),
            commits: Vec::new(),
            hackatime_projects: Vec::new(),
            devlog: Vec::new(),
            submissions: Vec::new(),
            is_joinable: true,
            is_hacktendo: false,
        }
    }

    pub fn has_member(&self, neighbor_id: &str) -> bool {
        links_to(&self.neighbors, neighbor_id)
    }

    /// The public projection returned by membership and lookup operations.
    pub fn summary(&self) -> AppSummary {
        AppSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            is_joinable: self.is_joinable,
            is_hacktendo: self.is_hacktendo,
            neighbors: self.neighbors.clone(),
            commit_count: self.commits.len(),
            project_count: self.hackatime_projects.len(),
            post_count: self.devlog.len(),
            submission_count: self.submissions.len(),
        }
    }
}

impl Entity for App {
    const COLLECTION: Collection = Collection::Apps;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Public projection of an [`App`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_joinable: bool,
    pub is_hacktendo: bool,
    pub neighbors: Vec<String>,
    pub commit_count: usize,
    pub project_count: usize,
    pub post_count: usize,
    pub submission_count: usize,
}

/// Local mirror of an externally tracked coding project, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HackatimeProject {
    #[serde(default)]
    pub id: String,

    /// External project name as reported by the time tracker
    pub name: String,

    /// Linked GitHub repository, used by the commit timeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_link: Option<String>,

    /// Neighbors attributed to this project (collaboration allowed)
    #[serde(default)]
    pub neighbor: Vec<String>,

    #[serde(default)]
    pub app: Vec<String>,
}

impl Entity for HackatimeProject {
    const COLLECTION: Collection = Collection::HackatimeProjects;

    fn id(&self) -> &str {
        &self.id
    }
}

/// One measured work interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub neighbor: Vec<String>,

    #[serde(default)]
    pub hackatime_project: Vec<String>,

    pub start_time: DateTime<Utc>,

    pub end_time: DateTime<Utc>,

    /// Length of the interval in whole seconds
    pub duration: i64,

    #[serde(default)]
    pub approved: bool,
}

impl Entity for Session {
    const COLLECTION: Collection = Collection::Sessions;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Review state and origin of a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitType {
    #[default]
    Pending,
    Approved,
    Github,
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitType::Pending => write!(f, "Pending"),
            CommitType::Approved => write!(f, "Approved"),
            CommitType::Github => write!(f, "Github"),
        }
    }
}

/// One attributable unit of logged progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    #[serde(default)]
    pub id: String,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_link: Option<String>,

    pub commit_time: DateTime<Utc>,

    #[serde(default)]
    pub sessions: Vec<String>,

    #[serde(default)]
    pub neighbor: Vec<String>,

    #[serde(default)]
    pub app: Vec<String>,

    #[serde(default)]
    pub hackatime_project: Vec<String>,

    #[serde(rename = "type", default)]
    pub commit_type: CommitType,
}

impl Entity for Commit {
    const COLLECTION: Collection = Collection::Commits;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A devlog entry by one neighbor on one app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub neighbor: Vec<String>,

    #[serde(default)]
    pub app: Vec<String>,

    pub demo_video: String,

    pub photobooth_video: String,

    pub description: String,

    pub created_at: DateTime<Utc>,

    /// Creation time of this neighbor's previous post, frozen at creation
    pub last_post: DateTime<Utc>,

    /// Comment record ids, oldest first
    #[serde(default)]
    pub comments: Vec<String>,
}

impl Entity for Post {
    const COLLECTION: Collection = Collection::Posts;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A reply on a devlog post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default)]
    pub id: String,

    pub content: String,

    #[serde(default)]
    pub post: Vec<String>,

    #[serde(default)]
    pub sent_from: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl Entity for Comment {
    const COLLECTION: Collection = Collection::Comments;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A YSWS-style submission of an app by one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub neighbor: Vec<String>,

    #[serde(default)]
    pub app: Vec<String>,

    pub code_url: String,

    pub playable_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Entity for Submission {
    const COLLECTION: Collection = Collection::Submissions;

    fn id(&self) -> &str {
        &self.id
    }
}
