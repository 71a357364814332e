//! Action logging through the CLI.
//!
//! - every invocation appends one JSON line to action.log
//! - bearer tokens never reach the log
//! - `action-log off` in config.kdl disables logging

mod common;

use common::{TestEnv, field};
use serde_json::Value;
use std::fs;

fn read_entries(env: &TestEnv) -> Vec<Value> {
    let path = env.data_path().join("action.log");
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_commands_are_logged() {
    let env = TestEnv::init();
    env.app("Gizmo");

    let entries = read_entries(&env);
    let commands: Vec<&str> = entries.iter().map(|e| e["command"].as_str().unwrap()).collect();
    assert_eq!(commands, vec!["init", "app create"]);
    assert_eq!(entries[1]["args"]["name"], "Gizmo");
    assert_eq!(entries[1]["success"], true);
}

#[test]
fn test_failures_are_logged_with_error() {
    let env = TestEnv::init();
    env.nb().args(["app", "show", "Nowhere"]).assert().failure();

    let entries = read_entries(&env);
    let last = entries.last().unwrap();
    assert_eq!(last["command"], "app show");
    assert_eq!(last["success"], false);
    assert!(last["error"].as_str().unwrap().contains("Nowhere"));
}

#[test]
fn test_tokens_never_logged() {
    let env = TestEnv::init();
    let token = field(&env.neighbor("ada@example.com"), "token");
    env.nb()
        .args(["config", "set", "github-token", "ghp_secretsecretsecret"])
        .assert()
        .success();
    env.nb_as(&token).args(["neighbor", "whoami"]).assert().success();

    let content = fs::read_to_string(env.data_path().join("action.log")).unwrap();
    assert!(!content.contains(&token));
    assert!(!content.contains("ghp_secretsecretsecret"));
}

#[test]
fn test_logging_can_be_disabled() {
    let env = TestEnv::init();
    env.nb()
        .args(["config", "set", "action-log", "off"])
        .assert()
        .success();
    let before = read_entries(&env).len();

    env.app("Gizmo");
    env.nb().arg("status").assert().success();
    assert_eq!(read_entries(&env).len(), before);
}
