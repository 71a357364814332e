//! KDL schema for config.kdl.
//!
//! ```kdl
//! github-api-base "https://api.github.com"
//! hackatime-api-base "https://hackatime.hackclub.com"
//! github-token "ghp_xxxxxxxxxxxxxxxxxxxx"
//! log-level "info"
//! timeline-order "chronological"  // or "source"
//! action-log #false
//! ```

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::timeline::TimelineOrder;
use crate::{Error, Result};

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "config.kdl";

/// Keys accepted by `nb config set`.
pub const CONFIG_KEYS: [&str; 6] = [
    "github-api-base",
    "hackatime-api-base",
    "github-token",
    "log-level",
    "timeline-order",
    "action-log",
];

/// Settings stored in config.kdl. Unset keys fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub github_api_base: Option<String>,
    pub hackatime_api_base: Option<String>,
    /// GitHub token for the commit timeline (sensitive)
    pub github_token: Option<String>,
    /// Default tracing filter when `NB_LOG` is unset
    pub log_level: Option<String>,
    pub timeline_order: Option<TimelineOrder>,
    /// Whether CLI invocations are appended to action.log
    pub action_log: Option<bool>,
}

fn string_value(doc: &KdlDocument, key: &str) -> Option<String> {
    doc.get(key)
        .and_then(|node| node.entries().first())
        .and_then(|entry| entry.value().as_string())
        .map(str::to_string)
}

fn string_node(key: &str, value: &str) -> KdlNode {
    let mut node = KdlNode::new(key);
    node.push(KdlEntry::new(KdlValue::String(value.to_string())));
    node
}

fn check_url(key: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::Config(format!("{} must be an http(s) URL, got '{}'", key, url)))
    }
}

impl LedgerConfig {
    pub fn path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    /// Read config.kdl from the data directory; a missing file is an empty config.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::path(data_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        let doc: KdlDocument = content
            .parse()
            .map_err(|e| Error::Config(format!("Failed to parse KDL in {}: {}", path.display(), e)))?;
        Ok(Self::from_kdl(&doc))
    }

    pub fn save(&self, data_dir: &Path) -> Result<()> {
        self.validate()?;
        fs::create_dir_all(data_dir)?;
        fs::write(Self::path(data_dir), self.to_kdl().to_string())?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.github_api_base {
            check_url("github-api-base", url)?;
        }
        if let Some(url) = &self.hackatime_api_base {
            check_url("hackatime-api-base", url)?;
        }
        if let Some(level) = &self.log_level {
            EnvFilter::try_new(level)
                .map_err(|e| Error::Config(format!("Invalid log-level '{}': {}", level, e)))?;
        }
        Ok(())
    }

    /// Set one key from its string form, as given on the command line.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "github-api-base" => self.github_api_base = Some(value.trim_end_matches('/').to_string()),
            "hackatime-api-base" => {
                self.hackatime_api_base = Some(value.trim_end_matches('/').to_string())
            }
            "github-token" => self.github_token = Some(value.to_string()).filter(|v| !v.is_empty()),
            "log-level" => self.log_level = Some(value.to_string()),
            "timeline-order" => self.timeline_order = Some(value.parse()?),
            "action-log" => {
                self.action_log = Some(match value.to_lowercase().as_str() {
                    "true" | "on" | "yes" | "1" => true,
                    "false" | "off" | "no" | "0" => false,
                    other => {
                        return Err(Error::Config(format!(
                            "action-log must be true or false, got '{}'",
                            other
                        )));
                    }
                })
            }
            other => {
                return Err(Error::Config(format!(
                    "Unknown config key '{}'. Valid keys: {}",
                    other,
                    CONFIG_KEYS.join(", ")
                )));
            }
        }
        self.validate()
    }

    pub fn from_kdl(doc: &KdlDocument) -> Self {
        Self {
            github_api_base: string_value(doc, "github-api-base"),
            hackatime_api_base: string_value(doc, "hackatime-api-base"),
            github_token: string_value(doc, "github-token"),
            log_level: string_value(doc, "log-level"),
            timeline_order: string_value(doc, "timeline-order").and_then(|s| s.parse().ok()),
            action_log: doc
                .get("action-log")
                .and_then(|node| node.entries().first())
                .and_then(|entry| entry.value().as_bool()),
        }
    }

    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();
        let strings = [
            ("github-api-base", &self.github_api_base),
            ("hackatime-api-base", &self.hackatime_api_base),
            ("github-token", &self.github_token),
            ("log-level", &self.log_level),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                doc.nodes_mut().push(string_node(key, value));
            }
        }
        if let Some(order) = self.timeline_order {
            doc.nodes_mut().push(string_node("timeline-order", order.as_str()));
        }
        if let Some(enabled) = self.action_log {
            let mut node = KdlNode::new("action-log");
            node.push(KdlEntry::new(KdlValue::Bool(enabled)));
            doc.nodes_mut().push(node);
        }
        doc
    }
}
