//! GitHub API interactions for the commit timeline.
//!
//! This module provides:
//! - `parse_github_repo`: Extracts `owner/repo` from a repository link
//! - `SourceControl`: The contract the timeline needs from a source-control host
//! - `GitHubClient`: Lists commits via GET /repos/{owner}/{repo}/commits

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

/// GitHub API base URL
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// User-Agent header required by GitHub API
const USER_AGENT: &str = "neighborhood-ledger";

/// Page size for commit listing (GitHub maximum)
const PER_PAGE: usize = 100;

/// Upper bound on pages fetched for one repository
const MAX_PAGES: usize = 10;

const REPO_PATTERN: &str = r"^(?:https?://)?(?:www\.)?(?:git@)?github\.com[/:]([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?(?:[/#?].*)?$";

/// Errors that can occur talking to GitHub.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// Token is invalid or expired (401 Unauthorized)
    #[error("GitHub returned 401 Unauthorized")]
    Unauthorized,

    /// Rate limited or token lacks permissions (403 Forbidden)
    #[error("GitHub returned 403 Forbidden: {0}")]
    Forbidden(String),

    /// Repository does not exist or is private
    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    /// Network or other HTTP error
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Failed to parse response
    #[error("Failed to parse GitHub response: {0}")]
    ParseError(String),

    /// History longer than the page cap; the window must be narrowed
    #[error("At least {0} commits in window for {1}; narrow the time range")]
    TooManyCommits(usize, String),
}

impl From<GitHubError> for crate::Error {
    fn from(err: GitHubError) -> Self {
        crate::Error::Upstream(format!("GitHub: {}", err))
    }
}

/// Parse `owner` and `repo` out of a GitHub repository link.
///
/// Accepts `https://github.com/o/r`, `github.com/o/r.git`, `git@github.com:o/r.git`
/// and links into a repository (`.../o/r/tree/main`).
pub fn parse_github_repo(link: &str) -> crate::Result<(String, String)> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(REPO_PATTERN).expect("Invalid regex"));

    let captures = pattern
        .captures(link.trim())
        .ok_or_else(|| crate::Error::InvalidGithubLink(link.to_string()))?;

    Ok((captures[1].to_string(), captures[2].to_string()))
}

/// A commit history query for one repository and author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitQuery {
    pub owner: String,
    pub repo: String,
    pub author: String,
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

/// A commit as reported by the source-control host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommit {
    pub sha: String,
    pub message: String,
    /// Web URL of the commit
    pub html_url: String,
    pub committed_at: DateTime<Utc>,
}

/// What the timeline needs from a source-control host.
pub trait SourceControl {
    fn list_commits(&self, query: &CommitQuery) -> Result<Vec<RemoteCommit>, GitHubError>;
}

/// Commit entry from GET /repos/{owner}/{repo}/commits (only fields we care about).
#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    html_url: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
    author: Option<CommitSignature>,
    committer: Option<CommitSignature>,
}

#[derive(Debug, Deserialize)]
struct CommitSignature {
    date: DateTime<Utc>,
}

impl CommitResponse {
    fn into_remote(self) -> Result<RemoteCommit, GitHubError> {
        let committed_at = self
            .commit
            .author
            .or(self.commit.committer)
            .map(|sig| sig.date)
            .ok_or_else(|| GitHubError::ParseError(format!("commit {} has no date", self.sha)))?;

        Ok(RemoteCommit {
            sha: self.sha,
            message: self.commit.message,
            html_url: self.html_url,
            committed_at,
        })
    }
}

/// Blocking GitHub REST client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    base_url: String,
    token: Option<String>,
}

impl Default for GitHubClient {
    fn default() -> Self {
        Self::new(GITHUB_API_BASE, None)
    }
}

impl GitHubClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn fetch_page(&self, query: &CommitQuery, page: usize) -> Result<Vec<RemoteCommit>, GitHubError> {
        let url = format!("{}/repos/{}/{}/commits", self.base_url, query.owner, query.repo);

        let mut request = ureq::get(&url)
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", USER_AGENT)
            .set("X-GitHub-Api-Version", "2022-11-28")
            .query("author", &query.author)
            .query(
                "since",
                &query.since.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .query(
                "until",
                &query.until.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .query("per_page", &PER_PAGE.to_string())
            .query("page", &page.to_string());

        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {}", token));
        }

        match request.call() {
            Ok(resp) => {
                let commits: Vec<CommitResponse> = resp
                    .into_json()
                    .map_err(|e| GitHubError::ParseError(e.to_string()))?;
                commits.into_iter().map(CommitResponse::into_remote).collect()
            }
            Err(ureq::Error::Status(401, _)) => Err(GitHubError::Unauthorized),
            Err(ureq::Error::Status(403, resp)) => {
                Err(GitHubError::Forbidden(resp.into_string().unwrap_or_default()))
            }
            Err(ureq::Error::Status(404, _)) => Err(GitHubError::RepoNotFound(format!(
                "{}/{}",
                query.owner, query.repo
            ))),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(GitHubError::HttpError(format!("HTTP {}: {}", code, body)))
            }
            Err(e) => Err(GitHubError::HttpError(e.to_string())),
        }
    }
}

impl SourceControl for GitHubClient {
    fn list_commits(&self, query: &CommitQuery) -> Result<Vec<RemoteCommit>, GitHubError> {
        let repo = format!("{}/{}", query.owner, query.repo);
        let commits = collect_pages(&repo, |page| self.fetch_page(query, page))?;
        debug!(
            repo = %repo,
            author = %query.author,
            count = commits.len(),
            "fetched GitHub commits"
        );
        Ok(commits)
    }
}

/// Fetch pages until a short one. Running out of pages first is an error,
/// never a truncated history.
fn collect_pages(
    repo: &str,
    mut fetch: impl FnMut(usize) -> Result<Vec<RemoteCommit>, GitHubError>,
) -> Result<Vec<RemoteCommit>, GitHubError> {
    let mut commits = Vec::new();
    for page in 1..=MAX_PAGES {
        let batch = fetch(page)?;
        let short_page = batch.len() < PER_PAGE;
        commits.extend(batch);
        if short_page {
            return Ok(commits);
        }
    }
    warn!(repo, pages = MAX_PAGES, "commit history exceeds page cap");
    Err(GitHubError::TooManyCommits(MAX_PAGES * PER_PAGE, repo.to_string()))
}
