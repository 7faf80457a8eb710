//! Reconciliation scenarios across the whole stack: policy files on disk,
//! the store, resolution, diff and apply.

use std::sync::Arc;
use std::time::Duration;

use orchard_core::store::{MemoryStore, PolicyStore, PolicyUpdate, StateStore};
use orchard_core::{ConfigResolver, Enforcer, EnforcerConfig, RevisionStatus, StatusFlag, Workspace};
use orchard_engine::{FailingPlugin, PluginRegistry, StepOutcome};
use orchard_lang::{StaticUserLoader, User};
use orchard_test_utils::scenario::{TestWorkspace, database_policy, db_claim, scenario_users};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

// =============================================================================
// Test Infrastructure
// =============================================================================

const BOB_CLAIM: &str = r#"---
kind: claim
metadata: { namespace: main, name: c3 }
user: bob
contract: db
labels: { target: k8s, priority: "50", team: blue }
"#;

const BOB_CLAIM_SCALED: &str = r#"---
kind: claim
metadata: { namespace: main, name: c3 }
user: bob
contract: db
labels: { target: k8s, priority: "50", team: blue, replicas: "3" }
"#;

struct Scenario {
    ws: TestWorkspace,
    _global: TempDir,
    workspace: Workspace,
}

impl Scenario {
    fn new() -> Self {
        let ws = TestWorkspace::database();
        ws.write("orchard.toml", "[enforcer]\nnoop = true\nmax_concurrent_actions = 3\n");
        let global = TempDir::new().unwrap();
        let workspace = Self::open(&ws, &global);
        Self {
            ws,
            _global: global,
            workspace,
        }
    }

    fn open(ws: &TestWorkspace, global: &TempDir) -> Workspace {
        let config = ConfigResolver::with_global_config_dir(ws.root(), global.path().to_path_buf())
            .resolve()
            .unwrap();
        Workspace::from_config(config).unwrap()
    }

    /// Sync the policy files as root and run one cycle
    async fn enforce(&self) -> orchard_core::CycleReport {
        self.workspace.sync_policy("root").unwrap();
        self.workspace.enforcer().enforce_once().await.unwrap()
    }

    fn instances(&self) -> usize {
        self.workspace.store().actual_state().unwrap().len()
    }
}

fn admin() -> User {
    User {
        domain_admin: true,
        ..User::new("root")
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_claim_lifecycle() {
    let scenario = Scenario::new();

    // c1 and c2 share the red instances
    let report = scenario.enforce().await;
    assert_eq!(report.revision.unwrap().status, RevisionStatus::Completed);
    assert_eq!(scenario.instances(), 4);

    // bob gets his own instances on team blue
    scenario.ws.write("policy/bob.yaml", BOB_CLAIM);
    let report = scenario.enforce().await;
    let revision = report.revision.unwrap();
    assert_eq!(revision.policy_generation, 3);
    assert_eq!(revision.tally.total, 11);
    assert!(revision.tally.is_success());
    assert_eq!(scenario.instances(), 8);

    // scaling only touches b and its bundle
    scenario.ws.write("policy/bob.yaml", BOB_CLAIM_SCALED);
    scenario.workspace.sync_policy("root").unwrap();
    let preview = scenario.workspace.enforcer().preview().unwrap();
    let actions: Vec<String> = preview
        .plan
        .actions()
        .map(|a| format!("{} {}", a.name(), a.key().component))
        .collect();
    assert_eq!(actions, vec!["update b", "endpoints b", "update root"]);
    assert!(preview.plan.actions().all(|a| a.key().keys == vec!["blue".to_string()]));
    assert!(preview.render().contains(r#"+   "replicas": "3""#));

    let report = scenario.workspace.enforcer().enforce_once().await.unwrap();
    assert!(report.revision.unwrap().tally.is_success());

    // dropping the claim removes the blue instances again
    scenario.ws.remove("policy/bob.yaml");
    let report = scenario.enforce().await;
    let revision = report.revision.unwrap();
    assert_eq!(revision.tally.total, 8);
    assert_eq!(scenario.instances(), 4);

    let statuses = scenario
        .workspace
        .enforcer()
        .claim_status(&["main/c1".to_string(), "main/c3".to_string()], StatusFlag::Readiness)
        .await
        .unwrap();
    assert_eq!(statuses[0].ready, Some(true));
    assert!(!statuses[1].found);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let scenario = Scenario::new();
    scenario.enforce().await;

    let global = TempDir::new().unwrap();
    let reopened = Scenario::open(&scenario.ws, &global);
    assert_eq!(reopened.store().actual_state().unwrap().len(), 4);
    assert!(reopened.enforcer().preview().unwrap().plan.is_empty());
}

#[tokio::test]
async fn test_panicking_plugin_then_recovery() {
    let store = Arc::new(MemoryStore::new());
    let policy = db_claim(database_policy(), "c1", "alice", &[("team", "red")]);
    store
        .update_policy(&admin(), PolicyUpdate::add(policy.objects().to_vec()))
        .unwrap();
    let users = Arc::new(StaticUserLoader::new(scenario_users()));

    let mut broken = PluginRegistry::noop(Duration::ZERO);
    broken.register("kubernetes", "helm", Arc::new(FailingPlugin::panic("#pg#b")));
    let enforcer = Enforcer::new(store.clone(), users.clone(), broken, EnforcerConfig::default());

    let report = enforcer.enforce_once().await.unwrap();
    let revision = report.revision.unwrap();
    assert_eq!(revision.status, RevisionStatus::Completed);
    assert_eq!(
        (revision.tally.success, revision.tally.failed, revision.tally.skipped),
        (3, 1, 7)
    );
    let failed: Vec<&str> = report
        .outcomes
        .iter()
        .filter(|(_, o)| matches!(o, StepOutcome::Failed { .. }))
        .map(|(k, _)| k.component.as_str())
        .collect();
    assert_eq!(failed, vec!["b"]);
    assert_eq!(store.actual_state().unwrap().len(), 1);

    let healthy = Enforcer::new(
        store.clone(),
        users,
        PluginRegistry::noop(Duration::ZERO),
        EnforcerConfig::default(),
    );
    let report = healthy.enforce_once().await.unwrap();
    let revision = report.revision.unwrap();
    assert_eq!(revision.generation, 2);
    assert_eq!(revision.tally.total, 8);
    assert!(revision.tally.is_success());
    assert_eq!(store.actual_state().unwrap().len(), 4);
}
