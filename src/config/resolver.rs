//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Environment variables (`NB_GITHUB_TOKEN`, `NB_GITHUB_API_BASE`,
//!    `NB_HACKATIME_API_BASE`)
//! 2. CLI flags
//! 3. `<data-dir>/config.kdl`
//! 4. Built-in defaults

use serde::Serialize;

use crate::config::LedgerConfig;
use crate::github::GITHUB_API_BASE;
use crate::hackatime::HACKATIME_API_BASE;
use crate::timeline::TimelineOrder;

pub const GITHUB_TOKEN_ENV: &str = "NB_GITHUB_TOKEN";
pub const GITHUB_API_BASE_ENV: &str = "NB_GITHUB_API_BASE";
pub const HACKATIME_API_BASE_ENV: &str = "NB_HACKATIME_API_BASE";

/// Default tracing filter.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    EnvVar(String),
    CliFlag,
    ConfigFile,
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::ConfigFile => write!(f, "file"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub github_api_base: Option<String>,
    pub hackatime_api_base: Option<String>,
    pub github_token: Option<String>,
    pub timeline_order: Option<TimelineOrder>,
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub github_api_base: Resolved<String>,
    pub hackatime_api_base: Resolved<String>,
    pub github_token: Option<Resolved<String>>,
    pub log_level: Resolved<String>,
    pub timeline_order: Resolved<TimelineOrder>,
    pub action_log: Resolved<bool>,
}

impl ResolvedConfig {
    pub fn github_token(&self) -> Option<&str> {
        self.github_token.as_ref().map(|r| r.value.as_str())
    }

    /// Token for display: first and last four characters only.
    pub fn masked_token(&self) -> Option<String> {
        self.github_token.as_ref().map(|r| {
            let chars: Vec<char> = r.value.chars().collect();
            let head: String = chars.iter().take(4).collect();
            if chars.len() <= 12 {
                format!("{}...", head)
            } else {
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("{}...{}", head, tail)
            }
        })
    }
}

/// Pick the first present value: env, CLI flag, file.
fn pick(
    env_name: Option<&str>,
    env: &impl Fn(&str) -> Option<String>,
    flag: Option<&String>,
    file: Option<&String>,
) -> Option<Resolved<String>> {
    if let Some(name) = env_name {
        if let Some(value) = env(name).filter(|v| !v.trim().is_empty()) {
            return Some(Resolved::new(value, ValueSource::EnvVar(name.to_string())));
        }
    }
    if let Some(value) = flag {
        return Some(Resolved::new(value.clone(), ValueSource::CliFlag));
    }
    file.map(|value| Resolved::new(value.clone(), ValueSource::ConfigFile))
}

/// Resolve configuration against the process environment.
pub fn resolve_config(file: &LedgerConfig, overrides: &ConfigOverrides) -> ResolvedConfig {
    resolve_config_with_env(file, overrides, |name| std::env::var(name).ok())
}

/// Resolve configuration with an explicit environment lookup.
pub fn resolve_config_with_env(
    file: &LedgerConfig,
    overrides: &ConfigOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let github_api_base = pick(
        Some(GITHUB_API_BASE_ENV),
        &env,
        overrides.github_api_base.as_ref(),
        file.github_api_base.as_ref(),
    )
    .unwrap_or_else(|| Resolved::new(GITHUB_API_BASE.to_string(), ValueSource::Default));

    let hackatime_api_base = pick(
        Some(HACKATIME_API_BASE_ENV),
        &env,
        overrides.hackatime_api_base.as_ref(),
        file.hackatime_api_base.as_ref(),
    )
    .unwrap_or_else(|| Resolved::new(HACKATIME_API_BASE.to_string(), ValueSource::Default));

    let github_token = pick(
        Some(GITHUB_TOKEN_ENV),
        &env,
        overrides.github_token.as_ref(),
        file.github_token.as_ref(),
    );

    let log_level = pick(None, &env, None, file.log_level.as_ref())
        .unwrap_or_else(|| Resolved::new(DEFAULT_LOG_LEVEL.to_string(), ValueSource::Default));

    let timeline_order = match (overrides.timeline_order, file.timeline_order) {
        (Some(order), _) => Resolved::new(order, ValueSource::CliFlag),
        (None, Some(order)) => Resolved::new(order, ValueSource::ConfigFile),
        (None, None) => Resolved::new(TimelineOrder::default(), ValueSource::Default),
    };

    let action_log = match file.action_log {
        Some(enabled) => Resolved::new(enabled, ValueSource::ConfigFile),
        None => Resolved::new(true, ValueSource::Default),
    };

    ResolvedConfig {
        github_api_base,
        hackatime_api_base,
        github_token,
        log_level,
        timeline_order,
        action_log,
    }
}
