//! Hackatime (time-tracking service) client.
//!
//! Hackatime reports aggregate coding time per project, not discrete
//! sessions: for a user (keyed by Slack id) it returns `{name, total_seconds}`
//! for every project seen since a start date.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Hackatime API base URL
pub const HACKATIME_API_BASE: &str = "https://hackatime.hackclub.com";

const USER_AGENT: &str = "neighborhood-ledger";

/// Errors that can occur talking to Hackatime.
#[derive(Debug, Error)]
pub enum HackatimeError {
    #[error("Hackatime user not found: {0}")]
    UserNotFound(String),

    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Failed to parse Hackatime response: {0}")]
    ParseError(String),
}

impl From<HackatimeError> for crate::Error {
    fn from(err: HackatimeError) -> Self {
        crate::Error::Upstream(format!("Hackatime: {}", err))
    }
}

/// One tracked project with its accumulated time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrackedProject {
    pub name: String,
    #[serde(default)]
    pub total_seconds: u64,
}

/// What project sync needs from the time-tracking service.
pub trait TimeTracker {
    fn projects_since(
        &self,
        slack_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrackedProject>, HackatimeError>;
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    data: StatsData,
}

#[derive(Debug, Deserialize)]
struct StatsData {
    #[serde(default)]
    projects: Vec<TrackedProject>,
}

/// Blocking Hackatime REST client.
#[derive(Debug, Clone)]
pub struct HackatimeClient {
    base_url: String,
}

impl Default for HackatimeClient {
    fn default() -> Self {
        Self::new(HACKATIME_API_BASE)
    }
}

impl HackatimeClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl TimeTracker for HackatimeClient {
    fn projects_since(
        &self,
        slack_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrackedProject>, HackatimeError> {
        let url = format!("{}/api/v1/users/{}/stats", self.base_url, slack_id);

        let response = ureq::get(&url)
            .set("Accept", "application/json")
            .set("User-Agent", USER_AGENT)
            .query("features", "projects")
            .query("start_date", &since.format("%Y-%m-%d").to_string())
            .call();

        match response {
            Ok(resp) => {
                let stats: StatsResponse = resp
                    .into_json()
                    .map_err(|e| HackatimeError::ParseError(e.to_string()))?;
                debug!(slack_id, count = stats.data.projects.len(), "fetched Hackatime projects");
                Ok(stats.data.projects)
            }
            Err(ureq::Error::Status(404, _)) => Err(HackatimeError::UserNotFound(slack_id.to_string())),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(HackatimeError::HttpError(format!("HTTP {}: {}", code, body)))
            }
            Err(e) => Err(HackatimeError::HttpError(e.to_string())),
        }
    }
}
