//! CLI end-to-end tests that invoke the compiled `orchard` binary against
//! temporary workspaces.

use assert_cmd::Command;
use orchard_test_utils::scenario::TestWorkspace;
use predicates::prelude::*;

const NOOP_CONFIG: &str = "[enforcer]\nnoop = true\nmax_concurrent_actions = 4\n";

/// Get a Command for the orchard binary, running in `ws`
fn orchard(ws: &TestWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("orchard").expect("Failed to find orchard binary");
    cmd.current_dir(ws.root())
        .env_remove("ORCHARD_USER")
        .env("XDG_CONFIG_HOME", ws.path(".config"));
    cmd
}

fn noop_workspace() -> TestWorkspace {
    let ws = TestWorkspace::database();
    ws.write("orchard.toml", NOOP_CONFIG);
    ws
}

// ============================================================================
// Basics
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let ws = TestWorkspace::new();
    orchard(&ws)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("enforce"))
        .stdout(predicate::str::contains("claim-status"));
}

#[test]
fn test_no_command_prints_hint() {
    let ws = TestWorkspace::new();
    orchard(&ws)
        .assert()
        .success()
        .stdout(predicate::str::contains("orchard --help"));
}

// ============================================================================
// validate
// ============================================================================

#[test]
fn test_validate_ok() {
    let ws = TestWorkspace::database();
    orchard(&ws)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Policy is valid"));
}

#[test]
fn test_validate_reports_issues_and_exits_one() {
    let ws = TestWorkspace::database();
    ws.write(
        "policy/bad.yaml",
        "kind: claim\nmetadata: { namespace: main, name: c9 }\nuser: alice\ncontract: nowhere\n",
    );
    orchard(&ws)
        .arg("validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("policy validation failed"));
}

// ============================================================================
// plan / enforce / status
// ============================================================================

#[test]
fn test_plan_is_a_dry_run() {
    let ws = noop_workspace();
    orchard(&ws)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("+ create"))
        .stdout(predicate::str::contains("Plan: "));
    assert!(!ws.exists(".orchard/state.json"));
}

#[test]
fn test_plan_json() {
    let ws = noop_workspace();
    let output = orchard(&ws).args(["plan", "--json"]).output().unwrap();
    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["steps"].as_array().map(Vec::len), Some(4));
}

#[test]
fn test_enforce_then_plan_shows_no_changes() {
    let ws = noop_workspace();
    orchard(&ws)
        .arg("enforce")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stored"))
        .stdout(predicate::str::contains("completed"));

    orchard(&ws)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("No changes"));

    orchard(&ws)
        .arg("enforce")
        .assert()
        .success()
        .stdout(predicate::str::contains("Unchanged"))
        .stdout(predicate::str::contains("Actual state matches"));
}

#[test]
fn test_enforce_as_unprivileged_user_fails() {
    let ws = noop_workspace();
    orchard(&ws)
        .args(["enforce", "--user", "bob"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("doesn't have ACL permissions"));
}

#[test]
fn test_claim_status_and_revision() {
    let ws = noop_workspace();
    orchard(&ws).arg("enforce").assert().success();

    orchard(&ws)
        .args(["claim-status", "main/c1", "main/c2", "main/zz", "--readiness"])
        .assert()
        .success()
        .stdout(predicate::str::contains("main/c1"))
        .stdout(predicate::str::contains("ready"))
        .stdout(predicate::str::contains("not found"));

    orchard(&ws)
        .args(["revision", "policy:2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Revision 1"));

    let output = orchard(&ws).args(["revision", "--json"]).output().unwrap();
    let revision: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(revision["status"], "completed");
    assert_eq!(revision["tally"]["failed"], 0);
}

#[test]
fn test_claim_resources() {
    let ws = noop_workspace();
    orchard(&ws).arg("enforce").assert().success();

    orchard(&ws)
        .args(["claim-resources", "main/c1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("storage:"))
        .stdout(predicate::str::contains("helm:"));

    let output = orchard(&ws)
        .args(["claim-resources", "main/c1", "--json"])
        .output()
        .unwrap();
    let instances: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let instances = instances.as_array().unwrap();
    assert_eq!(instances.len(), 3);
    let name = instances[0]["deploy_name"].as_str().unwrap();
    assert_eq!(instances[0]["resources"]["items"]["storage"][0], name);

    orchard(&ws)
        .args(["claim-resources", "main/zz"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("claim 'main/zz' not found"));
}

#[test]
fn test_revision_missing_exits_one() {
    let ws = TestWorkspace::database();
    orchard(&ws)
        .args(["revision", "7"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("revision not found"));
}
