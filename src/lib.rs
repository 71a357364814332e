//! Neighborhood - the contribution ledger behind the housing program.
//!
//! This library provides the core functionality for the `nb` CLI tool:
//! identity resolution, project attribution, session and commit recording,
//! commit timelines, app membership with cascading leave, and devlogs.

pub mod action_log;
pub mod cli;
pub mod commands;
pub mod config;
pub mod devlog;
pub mod github;
pub mod hackatime;
pub mod identity;
pub mod ledger;
pub mod membership;
pub mod models;
pub mod projects;
pub mod recorder;
pub mod store;
pub mod timeline;

pub use ledger::Ledger;

/// Test utilities shared by the unit tests of every ledger module.
#[cfg(test)]
pub(crate) mod test_utils;

/// Coarse error classes; every [`Error`] maps to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing input, detected before any store access
    Validation,
    /// The bearer token did not resolve to a neighbor
    Unauthorized,
    /// Neighbor, app, project, session or post absent
    NotFound,
    /// Membership and uniqueness conflicts
    Conflict,
    /// GitHub or Hackatime failure, or a malformed upstream response
    Upstream,
    /// Record store read/write failure
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Storage => "storage",
        }
    }
}

/// Library-level error type for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not initialized: run `nb init` first")]
    NotInitialized,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Unauthorized: no neighbor matches this token")]
    Unauthorized,

    #[error("App not found: {0}")]
    AppNotFound(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("App {0} is not accepting new members")]
    NotJoinable(String),

    #[error("Already a member of app {0}")]
    AlreadyMember(String),

    #[error("Not a member of app {0}")]
    NotMember(String),

    #[error("App {0} is not a Hacktendo game")]
    NotHacktendo(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid GitHub link: {0}")]
    InvalidGithubLink(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_)
            | Error::InvalidToken
            | Error::InvalidGithubLink(_)
            | Error::Config(_) => ErrorKind::Validation,
            Error::Unauthorized => ErrorKind::Unauthorized,
            Error::AppNotFound(_) | Error::NotFound(_) => ErrorKind::NotFound,
            Error::NotJoinable(_)
            | Error::AlreadyMember(_)
            | Error::NotMember(_)
            | Error::NotHacktendo(_)
            | Error::Conflict(_) => ErrorKind::Conflict,
            Error::Upstream(_) => ErrorKind::Upstream,
            Error::Io(_)
            | Error::Json(_)
            | Error::Database(_)
            | Error::Storage(_)
            | Error::NotInitialized => ErrorKind::Storage,
        }
    }

    /// HTTP-equivalent status code for this error.
    pub fn status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Upstream => 502,
            ErrorKind::Storage => 500,
        }
    }
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;
