//! CLI argument definitions for `nb`.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::timeline::TimelineOrder;

/// nb - the neighborhood contribution ledger.
///
/// Every command is one request: it prints one JSON document on stdout, or an
/// error document on stderr with exit code 1.
#[derive(Parser, Debug)]
#[command(name = "nb")]
#[command(author, version, about = "Contribution ledger for the neighborhood housing program", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Ledger data directory (defaults to the platform data dir)
    #[arg(long = "data-dir", global = true, env = "NB_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Bearer token of the acting neighbor
    #[arg(long, global = true, env = "NB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GitHub API base URL
    #[arg(long, global = true)]
    pub github_api_base: Option<String>,

    /// Hackatime API base URL
    #[arg(long, global = true)]
    pub hackatime_api_base: Option<String>,

    /// GitHub token used by the timeline
    #[arg(long, global = true)]
    pub github_token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the ledger in the data directory
    Init,

    /// Show the data directory and record counts
    Status,

    /// Neighbor registration and lookup
    Neighbor {
        #[command(subcommand)]
        command: NeighborCommands,
    },

    /// Apps and membership
    App {
        #[command(subcommand)]
        command: AppCommands,
    },

    /// Hackatime project attribution
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Stopwatch sessions
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Video-backed commits
    Commit {
        #[command(subcommand)]
        command: CommitCommands,
    },

    /// Merged commit feed of local commits and GitHub history
    Timeline {
        /// App name
        #[arg(long)]
        app: String,

        /// Window start (exclusive), RFC 3339 or YYYY-MM-DD
        #[arg(long, value_parser = parse_time)]
        start: DateTime<Utc>,

        /// Window end (exclusive), RFC 3339 or YYYY-MM-DD
        #[arg(long, value_parser = parse_time)]
        end: DateTime<Utc>,

        /// GitHub login to filter commits by
        #[arg(long = "github-user")]
        github_user: String,

        /// Entry ordering: chronological or source
        #[arg(long, value_parser = parse_order)]
        order: Option<TimelineOrder>,
    },

    /// Devlog posts and comments
    Post {
        #[command(subcommand)]
        command: PostCommands,
    },

    /// Configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum NeighborCommands {
    /// Register a neighbor and print their token
    Add {
        email: String,

        #[arg(long)]
        name: Option<String>,

        /// Slack user id (also the Hackatime user key)
        #[arg(long = "slack-id")]
        slack_id: Option<String>,
    },

    /// Resolve --token to a neighbor
    Whoami,
}

#[derive(Subcommand, Debug)]
pub enum AppCommands {
    /// Create an app
    Create {
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// Refuse new members
        #[arg(long)]
        closed: bool,

        /// Mark as a Hacktendo game
        #[arg(long)]
        hacktendo: bool,

        /// Make the --token neighbor the first member
        #[arg(long)]
        join: bool,
    },

    /// Show an app by id or name
    Show { app: String },

    /// Join an app
    Join { app_id: String },

    /// Leave an app, pruning your records from it
    Leave { app_id: String },

    /// Leave a Hacktendo game (membership only)
    Abandon { app_id: String },

    /// Submit an app for review
    Submit {
        app_id: String,

        #[arg(long = "code-url")]
        code_url: String,

        #[arg(long = "playable-url")]
        playable_url: String,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Get or create a project by normalized name
    Ensure {
        name: String,

        #[arg(long)]
        app: String,

        #[arg(long)]
        neighbor: String,
    },

    /// Link a project to a neighbor and app
    Attribute {
        project_id: String,

        #[arg(long)]
        neighbor: String,

        #[arg(long)]
        app: String,
    },

    /// Set the GitHub repository of a project
    LinkGithub { project_id: String, link: String },

    /// List projects sharing a normalized name
    Duplicates,

    /// Delete a project nobody is attributed to
    Delete { project_id: String },

    /// Import tracked projects from Hackatime
    Sync {
        #[arg(long)]
        app: String,

        /// Only projects with time since this date
        #[arg(long, value_parser = parse_time)]
        since: DateTime<Utc>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Record a stopwatch session
    Record {
        #[arg(long)]
        project: String,

        /// App name
        #[arg(long)]
        app: String,

        #[arg(long, value_parser = parse_time)]
        start: DateTime<Utc>,

        #[arg(long, value_parser = parse_time)]
        end: DateTime<Utc>,

        #[arg(long)]
        video: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CommitCommands {
    /// Record a pending video commit
    Record {
        /// App id
        #[arg(long)]
        app: String,

        #[arg(long)]
        project: String,

        #[arg(short, long)]
        message: String,

        #[arg(long)]
        video: String,

        #[arg(long)]
        session: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PostCommands {
    /// Create a devlog post
    Create {
        /// App name
        #[arg(long)]
        app: String,

        #[arg(long = "demo-video")]
        demo_video: String,

        #[arg(long = "photobooth-video")]
        photobooth_video: String,

        #[arg(long)]
        description: String,
    },

    /// List an app's posts, newest first
    List {
        /// App name
        #[arg(long)]
        app: String,
    },

    /// Comment on a post
    Comment { post_id: String, content: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration with sources
    Show,

    /// Set a configuration value
    Set { key: String, value: String },
}

/// Parse an RFC 3339 timestamp or a plain date (midnight UTC).
pub fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid time '{}': expected RFC 3339 or YYYY-MM-DD", s))
}

fn parse_order(s: &str) -> Result<TimelineOrder, String> {
    s.parse().map_err(|e: crate::Error| e.to_string())
}
