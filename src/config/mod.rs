//! Configuration for the `nb` CLI.
//!
//! One KDL file, `<data-dir>/config.kdl`, holds:
//! - `github-api-base` / `hackatime-api-base` - upstream endpoints
//! - `github-token` - token for the commit timeline
//! - `log-level` - default tracing filter when `NB_LOG` is unset
//! - `timeline-order` - "chronological" or "source"
//! - `action-log` - whether invocations are appended to action.log
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, GITHUB_API_BASE_ENV, GITHUB_TOKEN_ENV, HACKATIME_API_BASE_ENV, Resolved,
    ResolvedConfig, ValueSource, resolve_config, resolve_config_with_env,
};
pub use schema::{CONFIG_FILE, CONFIG_KEYS, LedgerConfig};
