//! Workspaces on disk: config layers, policy files, persisted state

use orchard_core::{ConfigResolver, Error, RevisionStatus, Workspace};
use orchard_core::store::{PolicyStore, RevisionStore, StateStore};
use orchard_test_utils::scenario::TestWorkspace;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const NOOP_CONFIG: &str = r#"
[enforcer]
noop = true
max_concurrent_actions = 2
"#;

fn open(ws: &TestWorkspace, global: &TempDir) -> Workspace {
    let config = ConfigResolver::with_global_config_dir(ws.root(), global.path().to_path_buf())
        .resolve()
        .unwrap();
    Workspace::from_config(config).unwrap()
}

#[tokio::test]
async fn test_sync_and_enforce_persist_across_reopen() {
    let ws = TestWorkspace::database();
    ws.write("orchard.toml", NOOP_CONFIG);
    let global = TempDir::new().unwrap();

    {
        let workspace = open(&ws, &global);
        assert_eq!(workspace.config().enforcer.max_concurrent_actions, 2);

        let outcome = workspace.sync_policy("root").unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.generation, 2);

        let report = workspace.enforcer().enforce_once().await.unwrap();
        let revision = report.revision.unwrap();
        assert_eq!(revision.status, RevisionStatus::Completed);
        assert!(revision.tally.is_success());
    }
    assert!(ws.exists(".orchard/state.json"));

    let workspace = open(&ws, &global);
    assert!(!workspace.sync_policy("root").unwrap().changed);
    assert_eq!(workspace.store().policy(None).unwrap().1, 2);
    assert_eq!(workspace.store().actual_state().unwrap().len(), 4);

    let report = workspace.enforcer().enforce_once().await.unwrap();
    assert!(report.is_skipped());
    assert_eq!(workspace.store().revisions().unwrap().len(), 1);
}

#[test]
fn test_sync_requires_privileges() {
    let ws = TestWorkspace::database();
    let global = TempDir::new().unwrap();
    let workspace = open(&ws, &global);

    let err = workspace.sync_policy("alice").unwrap_err();
    assert!(matches!(err, Error::Lang(orchard_lang::Error::AccessDenied { .. })));

    let err = workspace.sync_policy("mallory").unwrap_err();
    assert_eq!(err.to_string(), "unknown user 'mallory'");
}

#[test]
fn test_without_noop_plan_still_previews() {
    let ws = TestWorkspace::database();
    let global = TempDir::new().unwrap();
    let workspace = open(&ws, &global);
    workspace.sync_policy("root").unwrap();

    let preview = workspace.enforcer().preview().unwrap();
    assert_eq!(preview.desired.len(), 4);
    let text = preview.render();
    assert!(text.contains("+ create"));
    assert!(text.contains("Plan: "));
}

#[test]
fn test_plan_files_stores_nothing() {
    let ws = TestWorkspace::database();
    let global = TempDir::new().unwrap();
    let workspace = open(&ws, &global);

    let preview = workspace.plan_files().unwrap();
    assert_eq!(preview.policy_generation, 1);
    assert_eq!(preview.desired.len(), 4);
    assert_eq!(workspace.store().policy(None).unwrap().1, 1);
    assert!(!ws.exists(".orchard/state.json"));
}

#[test]
fn test_validate_files_reports_issues() {
    let ws = TestWorkspace::database();
    ws.write(
        "policy/broken.yaml",
        "kind: contract\nmetadata: { namespace: main, name: broken }\ncontexts:\n  - name: x\n    allocation: { bundle: missing }\n",
    );
    let global = TempDir::new().unwrap();
    let workspace = open(&ws, &global);

    let err = workspace.validate_files().unwrap_err();
    assert!(err.to_string().contains("bundle 'missing'"));
}
