//! Smoke tests for the `ragent` binary that need no inference service.

mod common;

use common::{ragent_cmd, Sandbox};
use predicates::prelude::*;

#[test]
fn test_help_lists_commands() {
    ragent_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("index"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_version() {
    ragent_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ragent "));
}

#[test]
fn test_status_without_index() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("no index loaded"))
        .stdout(predicate::str::contains("local"))
        .stdout(predicate::str::contains("down"));
}

#[test]
fn test_status_json() {
    let sandbox = Sandbox::new();
    let output = sandbox.cmd().args(["status", "--json"]).output().unwrap();
    assert!(output.status.success());

    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["indexLoaded"], false);
    assert_eq!(status["passageCount"], 0);
    assert_eq!(status["defaultProvider"], "local");
    assert_eq!(status["providers"][0]["reachable"], false);
}

#[test]
fn test_index_rejects_malformed_line() {
    let sandbox = Sandbox::new();
    let file = sandbox.write("bad.jsonl", "{\"content\": \"fine\"}\n{oops\n");

    sandbox
        .cmd()
        .arg("index")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("bad.jsonl:2"));
}

#[test]
fn test_index_rejects_empty_content() {
    let sandbox = Sandbox::new();
    let file = sandbox.write("empty.jsonl", "{\"content\": \"fine\"}\n{\"content\": \"  \"}\n");

    sandbox
        .cmd()
        .arg("index")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("content is empty"));

    assert!(!sandbox.dir.path().join("index").join("current").exists());
}

#[test]
fn test_index_missing_file() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["index", "does-not-exist.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_clear_without_index_succeeds() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("Index cleared"));
}

#[test]
fn test_sessions_and_history_empty() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["sessions", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));

    sandbox
        .cmd()
        .args(["history", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No history for session `demo`"));
}

#[test]
fn test_invalid_config_fails_with_hint() {
    let sandbox = Sandbox::new();
    let config = sandbox.write("broken.yaml", "retrieval: [not, a, map\n");

    ragent_cmd()
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to initialize ragent engine"))
        .stderr(predicate::str::contains("Check your config at"));
}
