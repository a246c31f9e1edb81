//! Focused CLI argument parsing tests.
//!
//! Every test points `--project` at a fresh temp dir so no stray tenet.toml
//! from the working directory leaks in.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn tenet(project: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tenet").unwrap();
    cmd.env_remove("RUST_LOG")
        .args(["--project", project.path().to_str().unwrap()]);
    cmd
}

const POLICY: &str = r#"{
    "attributes": [
        { "category": "subject", "name": "role", "value_type": "string", "multiplicity": "bag" }
    ],
    "policy": {
        "kind": "set",
        "id": "root",
        "algorithm": "deny-unless-permit",
        "children": [
            {
                "kind": "rule",
                "id": "admins",
                "effect": "permit",
                "condition": {
                    "compare": {
                        "op": "in",
                        "left": { "literal": { "simple": { "string": "admin" } } },
                        "right": { "attribute": { "category": "subject", "name": "role", "value_type": "string", "multiplicity": "bag" } }
                    }
                }
            }
        ]
    }
}"#;

// ============================================================================
// Basic Commands
// ============================================================================

#[test]
fn version_flag_shows_version() {
    Command::cargo_bin("tenet")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tenet"));
}

#[test]
fn help_flag_shows_usage() {
    Command::cargo_bin("tenet")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("evaluate attribute-based access policies"))
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn no_command_shows_help() {
    Command::cargo_bin("tenet")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn unknown_command_fails() {
    Command::cargo_bin("tenet")
        .unwrap()
        .arg("grant")
        .assert()
        .failure();
}

// ============================================================================
// Demo
// ============================================================================

#[test]
fn demo_denies_unassigned_and_permits_assigned() {
    let temp = TempDir::new().unwrap();
    tenet(&temp)
        .arg("demo")
        .assert()
        .success()
        .stdout(predicate::str::contains("Scenario 1"))
        .stdout(predicate::str::contains("decision:         Deny"))
        .stdout(predicate::str::contains("decision:         Permit"))
        .stdout(predicate::str::contains("audit-log"));
}

// ============================================================================
// Init, Validate, Evaluate
// ============================================================================

#[test]
fn init_writes_config_and_policy() {
    let temp = TempDir::new().unwrap();
    tenet(&temp).arg("init").assert().success();

    assert!(temp.path().join("tenet.toml").exists());
    assert!(temp.path().join("policy.json").exists());

    // Second init refuses to overwrite
    tenet(&temp)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn validate_uses_configured_policy_path() {
    let temp = TempDir::new().unwrap();
    tenet(&temp).arg("init").assert().success();

    tenet(&temp)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Root:       edocs"));
}

#[test]
fn validate_reports_undeclared_attribute() {
    let temp = TempDir::new().unwrap();
    let policy = temp.path().join("broken.json");
    fs::write(&policy, POLICY.replacen("\"name\": \"role\"", "\"name\": \"team\"", 1)).unwrap();

    tenet(&temp)
        .args(["validate", policy.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("subject.role"));
}

#[test]
fn validate_missing_file_fails() {
    let temp = TempDir::new().unwrap();
    tenet(&temp)
        .args(["validate", "/nonexistent/policy.json"])
        .assert()
        .failure();
}

#[test]
fn evaluate_prints_response_json() {
    let temp = TempDir::new().unwrap();
    let policy = temp.path().join("policy.json");
    let request = temp.path().join("request.json");
    fs::write(&policy, POLICY).unwrap();
    fs::write(
        &request,
        r#"{ "subject": "alice", "action": "read", "resource": "doc1",
             "attributes": [ { "category": "subject", "name": "role", "value": ["admin"] } ] }"#,
    )
    .unwrap();

    tenet(&temp)
        .args([
            "evaluate",
            policy.to_str().unwrap(),
            request.to_str().unwrap(),
            "--stats",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"decision\": \"permit\""))
        .stderr(predicate::str::contains("nodes visited"));
}

#[test]
fn evaluate_rejects_unknown_request_attribute() {
    let temp = TempDir::new().unwrap();
    let policy = temp.path().join("policy.json");
    let request = temp.path().join("request.json");
    fs::write(&policy, POLICY).unwrap();
    fs::write(
        &request,
        r#"{ "subject": "alice", "action": "read", "resource": "doc1",
             "attributes": [ { "category": "subject", "name": "clearance", "value": 3 } ] }"#,
    )
    .unwrap();

    tenet(&temp)
        .args(["evaluate", policy.to_str().unwrap(), request.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("clearance"));
}

#[test]
fn evaluate_requires_request_argument() {
    let temp = TempDir::new().unwrap();
    tenet(&temp)
        .args(["evaluate", "policy.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn config_show_formats() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("tenet.toml"), "[pdp]\nmax_depth = 12\n").unwrap();

    tenet(&temp)
        .args(["config", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"max_depth\": 12"));

    tenet(&temp)
        .args(["config", "show", "--format", "toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_depth = 12"));

    tenet(&temp)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Max depth: 12"));

    tenet(&temp)
        .args(["config", "show", "--format", "yaml"])
        .assert()
        .failure();
}

#[test]
fn config_validate_rejects_zero_depth() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("tenet.toml"), "[pdp]\nmax_depth = 0\n").unwrap();

    tenet(&temp)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}
