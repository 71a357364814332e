//! Command implementations for the `nb` CLI.
//!
//! Each function runs one ledger operation against the durable store and
//! returns a value implementing [`Output`], which `main` prints as JSON or
//! as human-readable text.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{ConfigOverrides, LedgerConfig, ResolvedConfig, resolve_config};
use crate::devlog::PostView;
use crate::github::GitHubClient;
use crate::hackatime::HackatimeClient;
use crate::ledger::{Ledger, LedgerOptions};
use crate::membership::LeaveReport;
use crate::models::{AppSummary, Comment, Commit, HackatimeProject, Neighbor, Post, Submission};
use crate::projects::{DuplicateProjects, SyncReport};
use crate::recorder::RecordedSession;
use crate::store::{SqliteStore, get_storage_dir};
use crate::timeline::TimelineEntry;
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    fn to_json(&self) -> String;

    fn to_human(&self) -> String;
}

fn json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

fn time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub data_dir: PathBuf,
    pub config: ResolvedConfig,
    pub token: Option<String>,
}

impl Context {
    /// Resolve the data directory and configuration for one invocation.
    pub fn load(data_dir: Option<&Path>, token: Option<String>, overrides: &ConfigOverrides) -> Result<Self> {
        let data_dir = get_storage_dir(data_dir)?;
        let file = LedgerConfig::load(&data_dir)?;
        Ok(Self::new(data_dir, &file, token, overrides))
    }

    /// Build from a data directory and config file that are already loaded.
    pub fn new(
        data_dir: PathBuf,
        file: &LedgerConfig,
        token: Option<String>,
        overrides: &ConfigOverrides,
    ) -> Self {
        Self {
            config: resolve_config(file, overrides),
            data_dir,
            token,
        }
    }

    pub fn ledger(&self) -> Result<Ledger<SqliteStore>> {
        let store = SqliteStore::open(&self.data_dir)?;
        Ok(Ledger::with_options(
            store,
            LedgerOptions {
                timeline_order: self.config.timeline_order.value,
            },
        ))
    }

    pub fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::InvalidInput("token is required (--token or NB_TOKEN)".to_string()))
    }

    pub fn github(&self) -> GitHubClient {
        GitHubClient::new(
            &self.config.github_api_base.value,
            self.config.github_token().map(str::to_string),
        )
    }

    pub fn hackatime(&self) -> HackatimeClient {
        HackatimeClient::new(&self.config.hackatime_api_base.value)
    }
}

// === Setup ===

#[derive(Serialize)]
pub struct InitResult {
    pub data_dir: String,
    pub created: bool,
}

impl Output for InitResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.created {
            format!("Initialized ledger in {}", self.data_dir)
        } else {
            format!("Ledger already initialized in {}", self.data_dir)
        }
    }
}

pub fn init(ctx: &Context) -> Result<InitResult> {
    let created = !SqliteStore::exists(&ctx.data_dir);
    SqliteStore::init(&ctx.data_dir)?;
    Ok(InitResult {
        data_dir: ctx.data_dir.display().to_string(),
        created,
    })
}

#[derive(Serialize)]
pub struct CollectionCount {
    pub collection: String,
    pub count: usize,
}

#[derive(Serialize)]
pub struct StatusResult {
    pub data_dir: String,
    pub collections: Vec<CollectionCount>,
}

impl Output for StatusResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("Ledger: {}", self.data_dir)];
        for c in &self.collections {
            lines.push(format!("  {:<18} {}", c.collection, c.count));
        }
        lines.join("\n")
    }
}

pub fn status(ctx: &Context) -> Result<StatusResult> {
    let store = SqliteStore::open(&ctx.data_dir)?;
    let collections = store
        .counts()?
        .into_iter()
        .map(|(collection, count)| CollectionCount {
            collection: collection.to_string(),
            count,
        })
        .collect();
    Ok(StatusResult {
        data_dir: ctx.data_dir.display().to_string(),
        collections,
    })
}

// === Neighbors ===

impl Output for Neighbor {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("{} {}", self.id, self.email)];
        if let Some(name) = &self.full_name {
            lines.push(format!("  Name: {}", name));
        }
        if let Some(slack) = &self.slack_id {
            lines.push(format!("  Slack: {}", slack));
        }
        lines.push(format!("  Token: {}", self.token));
        lines.join("\n")
    }
}

pub fn neighbor_add(
    ctx: &Context,
    email: &str,
    name: Option<String>,
    slack_id: Option<String>,
) -> Result<Neighbor> {
    ctx.ledger()?.register_neighbor(email, name, slack_id)
}

pub fn whoami(ctx: &Context) -> Result<Neighbor> {
    ctx.ledger()?.resolve(ctx.token()?)
}

// === Apps ===

impl Output for AppSummary {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut flags = Vec::new();
        if !self.is_joinable {
            flags.push("closed");
        }
        if self.is_hacktendo {
            flags.push("hacktendo");
        }
        let mut lines = vec![format!("{} {}", self.id, self.name)];
        if !flags.is_empty() {
            lines[0].push_str(&format!(" [{}]", flags.join(", ")));
        }
        if let Some(desc) = &self.description {
            lines.push(format!("  {}", desc));
        }
        lines.push(format!("  Members: {}", self.neighbors.len()));
        lines.push(format!(
            "  Commits: {}  Projects: {}  Posts: {}  Submissions: {}",
            self.commit_count, self.project_count, self.post_count, self.submission_count
        ));
        lines.join("\n")
    }
}

pub fn app_create(
    ctx: &Context,
    name: &str,
    description: Option<String>,
    closed: bool,
    hacktendo: bool,
    join: bool,
) -> Result<AppSummary> {
    let creator = if join { Some(ctx.token()?) } else { None };
    let app = ctx
        .ledger()?
        .create_app(name, description, !closed, hacktendo, creator)?;
    Ok(app.summary())
}

pub fn app_show(ctx: &Context, key: &str) -> Result<AppSummary> {
    ctx.ledger()?.show_app(key)
}

pub fn app_join(ctx: &Context, app_id: &str) -> Result<AppSummary> {
    ctx.ledger()?.join(ctx.token()?, app_id)
}

impl Output for LeaveReport {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Left {}: unlinked {} commit(s), {} project(s), {} post(s), {} submission(s)",
            self.app_id,
            self.commits_unlinked,
            self.projects_unlinked,
            self.posts_unlinked,
            self.submissions_unlinked
        )
    }
}

pub fn app_leave(ctx: &Context, app_id: &str) -> Result<LeaveReport> {
    ctx.ledger()?.leave(ctx.token()?, app_id)
}

pub fn app_abandon(ctx: &Context, app_id: &str) -> Result<AppSummary> {
    ctx.ledger()?.abandon(ctx.token()?, app_id)
}

impl Output for Submission {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Submission {}\n  Code: {}\n  Play: {}",
            self.id, self.code_url, self.playable_url
        )
    }
}

pub fn app_submit(
    ctx: &Context,
    app_id: &str,
    code_url: &str,
    playable_url: &str,
    description: Option<String>,
) -> Result<Submission> {
    ctx.ledger()?
        .submit(ctx.token()?, app_id, code_url, playable_url, description)
}

// === Projects ===

impl Output for HackatimeProject {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut line = format!("{} {}", self.id, self.name);
        if let Some(link) = &self.github_link {
            line.push_str(&format!(" ({})", link));
        }
        format!("{}\n  Neighbors: {}", line, self.neighbor.len())
    }
}

pub fn project_ensure(ctx: &Context, name: &str, app_id: &str, neighbor_id: &str) -> Result<HackatimeProject> {
    ctx.ledger()?.ensure_project(name, app_id, neighbor_id)
}

pub fn project_attribute(
    ctx: &Context,
    project_id: &str,
    neighbor_id: &str,
    app_id: &str,
) -> Result<HackatimeProject> {
    ctx.ledger()?.attribute_project(project_id, neighbor_id, app_id)
}

pub fn project_link_github(ctx: &Context, project_id: &str, link: &str) -> Result<HackatimeProject> {
    ctx.ledger()?.link_github(ctx.token()?, project_id, link)
}

pub fn project_delete(ctx: &Context, project_id: &str) -> Result<HackatimeProject> {
    ctx.ledger()?.delete_orphan_project(ctx.token()?, project_id)
}

#[derive(Serialize)]
pub struct DuplicatesResult {
    pub duplicates: Vec<DuplicateProjects>,
}

impl Output for DuplicatesResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.duplicates.is_empty() {
            return "No duplicate projects.".to_string();
        }
        self.duplicates
            .iter()
            .map(|d| format!("{}: {}", d.normalized_name, d.ids.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn project_duplicates(ctx: &Context) -> Result<DuplicatesResult> {
    Ok(DuplicatesResult {
        duplicates: ctx.ledger()?.find_duplicate_projects()?,
    })
}

impl Output for SyncReport {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Synced {} project(s), skipped {}",
            self.synced.len(),
            self.skipped
        )];
        for p in &self.synced {
            let tag = if p.created { " (new)" } else { "" };
            lines.push(format!("  {} {} {}s{}", p.id, p.name, p.total_seconds, tag));
        }
        lines.join("\n")
    }
}

pub fn project_sync(ctx: &Context, app_id: &str, since: DateTime<Utc>) -> Result<SyncReport> {
    let tracker = ctx.hackatime();
    ctx.ledger()?
        .sync_projects(ctx.token()?, app_id, &tracker, since)
}

// === Sessions and commits ===

impl Output for RecordedSession {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Session {} ({}s, {} - {})\nCommit {} [{}] {}",
            self.session.id,
            self.session.duration,
            time(&self.session.start_time),
            time(&self.session.end_time),
            self.commit.id,
            self.commit.commit_type,
            self.commit.message
        )
    }
}

pub fn session_record(
    ctx: &Context,
    project: &str,
    app_name: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    video: &str,
) -> Result<RecordedSession> {
    ctx.ledger()?
        .record_session(ctx.token()?, project, app_name, start, end, video)
}

impl Output for Commit {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Commit {} [{}] {} at {}",
            self.id,
            self.commit_type,
            self.message,
            time(&self.commit_time)
        )
    }
}

pub fn commit_record(
    ctx: &Context,
    app_id: &str,
    project: &str,
    message: &str,
    video: &str,
    session_id: &str,
) -> Result<Commit> {
    ctx.ledger()?
        .record_commit(ctx.token()?, app_id, project, message, video, session_id)
}

// === Timeline ===

#[derive(Serialize)]
pub struct TimelineResult {
    pub entries: Vec<TimelineEntry>,
}

impl Output for TimelineResult {
    fn to_json(&self) -> String {
        json(&self.entries)
    }

    fn to_human(&self) -> String {
        if self.entries.is_empty() {
            return "No commits in this window.".to_string();
        }
        self.entries
            .iter()
            .map(|entry| {
                let c = entry.commit();
                let kind = if entry.is_github() { "github" } else { "video" };
                let duration = c.duration.map(|d| format!(" ({}s)", d)).unwrap_or_default();
                format!("{} [{}] {}{}", time(&c.commit_time), kind, c.message, duration)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn timeline(
    ctx: &Context,
    app_name: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    github_user: &str,
) -> Result<TimelineResult> {
    let source = ctx.github();
    let entries = ctx
        .ledger()?
        .get_timeline(ctx.token()?, app_name, start, end, github_user, &source)?;
    Ok(TimelineResult { entries })
}

// === Devlog ===

impl Output for Post {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Post {} at {} (previous post {})\n  {}",
            self.id,
            time(&self.created_at),
            time(&self.last_post),
            self.description
        )
    }
}

pub fn post_create(
    ctx: &Context,
    app_name: &str,
    demo_video: &str,
    photobooth_video: &str,
    description: &str,
) -> Result<Post> {
    ctx.ledger()?
        .create_post(ctx.token()?, app_name, demo_video, photobooth_video, description)
}

#[derive(Serialize)]
pub struct PostsResult {
    pub posts: Vec<PostView>,
}

impl Output for PostsResult {
    fn to_json(&self) -> String {
        json(&self.posts)
    }

    fn to_human(&self) -> String {
        if self.posts.is_empty() {
            return "No posts.".to_string();
        }
        let mut lines = Vec::new();
        for view in &self.posts {
            lines.push(format!(
                "{} {} {}",
                view.post.id,
                time(&view.post.created_at),
                view.post.description
            ));
            for comment in &view.comment_thread {
                lines.push(format!("    > {}", comment.content));
            }
        }
        lines.join("\n")
    }
}

pub fn post_list(ctx: &Context, app_name: &str) -> Result<PostsResult> {
    Ok(PostsResult {
        posts: ctx.ledger()?.list_posts(app_name)?,
    })
}

impl Output for Comment {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Comment {} on {}", self.id, self.post.join(", "))
    }
}

pub fn post_comment(ctx: &Context, post_id: &str, content: &str) -> Result<Comment> {
    ctx.ledger()?.add_comment(ctx.token()?, post_id, content)
}

// === Config ===

#[derive(Serialize)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub value: Option<String>,
    pub source: Option<String>,
}

#[derive(Serialize)]
pub struct ConfigResult {
    pub path: String,
    pub entries: Vec<ConfigEntry>,
}

impl Output for ConfigResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("Config: {}", self.path)];
        for entry in &self.entries {
            lines.push(format!(
                "  {:<20} {} ({})",
                entry.key,
                entry.value.as_deref().unwrap_or("-"),
                entry.source.as_deref().unwrap_or("unset")
            ));
        }
        lines.join("\n")
    }
}

fn entry<T: ToString>(key: &'static str, value: &crate::config::Resolved<T>) -> ConfigEntry {
    ConfigEntry {
        key,
        value: Some(value.value.to_string()),
        source: Some(value.source.to_string()),
    }
}

pub fn config_show(ctx: &Context) -> Result<ConfigResult> {
    let config = &ctx.config;
    let token = ConfigEntry {
        key: "github-token",
        value: config.masked_token(),
        source: config.github_token.as_ref().map(|t| t.source.to_string()),
    };
    Ok(ConfigResult {
        path: LedgerConfig::path(&ctx.data_dir).display().to_string(),
        entries: vec![
            entry("github-api-base", &config.github_api_base),
            entry("hackatime-api-base", &config.hackatime_api_base),
            token,
            entry("log-level", &config.log_level),
            entry("timeline-order", &config.timeline_order),
            entry("action-log", &config.action_log),
        ],
    })
}

#[derive(Serialize)]
pub struct ConfigSetResult {
    pub key: String,
    pub path: String,
}

impl Output for ConfigSetResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Set {} in {}", self.key, self.path)
    }
}

pub fn config_set(ctx: &Context, key: &str, value: &str) -> Result<ConfigSetResult> {
    let mut file = LedgerConfig::load(&ctx.data_dir)?;
    file.set(key, value)?;
    file.save(&ctx.data_dir)?;
    Ok(ConfigSetResult {
        key: key.to_string(),
        path: LedgerConfig::path(&ctx.data_dir).display().to_string(),
    })
}
