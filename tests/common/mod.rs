//! Common test utilities for nb integration tests.
//!
//! Provides `TestEnv`, an isolated data directory per test so runs never
//! touch the user's real ledger.

#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::Value;
pub use tempfile::TempDir;

/// A test environment with an isolated ledger directory.
///
/// `nb()` sets `NB_DATA_DIR` per command and clears every variable that
/// could leak configuration from the developer's shell.
pub struct TestEnv {
    pub data_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a test environment and run `nb init`.
    pub fn init() -> Self {
        let env = Self::new();
        env.nb().arg("init").assert().success();
        env
    }

    pub fn nb(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_nb"));
        cmd.env("NB_DATA_DIR", self.data_dir.path());
        for var in [
            "NB_TOKEN",
            "NB_LOG",
            "NB_GITHUB_TOKEN",
            "NB_GITHUB_API_BASE",
            "NB_HACKATIME_API_BASE",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    /// An `nb` command acting as the neighbor holding `token`.
    pub fn nb_as(&self, token: &str) -> Command {
        let mut cmd = self.nb();
        cmd.env("NB_TOKEN", token);
        cmd
    }

    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }

    /// Register a neighbor and return the created record.
    pub fn neighbor(&self, email: &str) -> Value {
        let output = self
            .nb()
            .args(["neighbor", "add", email])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        parse(&output)
    }

    /// Create a joinable app and return its summary.
    pub fn app(&self, name: &str) -> Value {
        let output = self
            .nb()
            .args(["app", "create", name])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        parse(&output)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse command stdout as JSON.
pub fn parse(stdout: &[u8]) -> Value {
    serde_json::from_slice(stdout).unwrap()
}

/// Field of a JSON document as an owned string.
pub fn field(value: &Value, key: &str) -> String {
    value[key].as_str().unwrap().to_string()
}
