//! Ready-made policies, users and on-disk workspaces.
//!
//! The database scenario has one namespace, `main`:
//!
//! - cluster `k8s` (type `kubernetes`) in the system namespace
//! - bundle `pg` with components `c` (deps `a`, `b`), `b` (dep `a`) and
//!   `a`, declared in that order
//! - contract `db` with context `A` (`priority >= 100`, one instance per
//!   team) and the catch-all context `B` (one instance per team, `shared`
//!   when unlabelled)
//! - bundle `web` whose `app` component depends on a `database` component
//!   referencing contract `db`, and contract `web` allocating it

use std::fs;
use std::path::{Path, PathBuf};

use orchard_lang::{Component, ParameterTree, User};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::builder::{PolicyBuilder, context};

/// Target label value pointing at the scenario cluster
pub const TARGET: &str = "k8s";

/// Turn a JSON object literal into a parameter tree
pub fn tree(value: Value) -> ParameterTree {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// The database scenario without any claims
pub fn database_policy() -> PolicyBuilder {
    PolicyBuilder::new()
        .cluster("k8s", "kubernetes")
        .consumers("main")
        .bundle(
            "main",
            "pg",
            vec![
                Component::code("c", "helm")
                    .depends_on(["a", "b"])
                    .with_params(tree(json!({
                        "name": "{{ .Discovery.Instance }}",
                        "volume": "{{ .Discovery.a.volume }}",
                    }))),
                Component::code("b", "helm")
                    .depends_on(["a"])
                    .with_params(tree(json!({ "replicas": "{{ default \"1\" .Labels.replicas }}" }))),
                Component::code("a", "storage")
                    .with_discovery(tree(json!({ "volume": "{{ .Discovery.Instance }}-vol" }))),
            ],
        )
        .contract(
            "main",
            "db",
            vec![
                context("A", Some("priority >= 100"), "pg", &["{{ .Labels.team }}"]),
                context("B", None, "pg", &["{{ default \"shared\" .Labels.team }}"]),
            ],
        )
        .bundle(
            "main",
            "web",
            vec![
                Component::code("app", "helm")
                    .depends_on(["database"])
                    .with_params(tree(json!({ "db": "{{ .Discovery.database.instance }}" }))),
                Component::contract("database", "db"),
            ],
        )
        .contract("main", "web", vec![context("default", None, "web", &[])])
}

/// A claim on contract `db` in `main` with the scenario target set
pub fn db_claim(builder: PolicyBuilder, name: &str, user: &str, labels: &[(&str, &str)]) -> PolicyBuilder {
    let mut all = vec![("target", TARGET)];
    all.extend_from_slice(labels);
    builder.claim("main", name, user, "db", &all)
}

/// `alice` and `carol` on team red, `bob` on team blue, `root` domain admin
pub fn scenario_users() -> Vec<User> {
    vec![
        User::new("alice").with_label("team", "red"),
        User::new("bob").with_label("team", "blue"),
        User::new("carol").with_label("team", "red"),
        User {
            domain_admin: true,
            ..User::new("root")
        },
    ]
}

/// The database scenario as policy files
pub const POLICY_YAML: &str = r#"---
kind: cluster
metadata: { namespace: system, name: k8s }
type: kubernetes
---
kind: aclrule
metadata: { namespace: system, name: consumers-main }
weight: 100
actions:
  add-role: { service_consumer: main }
---
kind: bundle
metadata: { namespace: main, name: pg }
components:
  - name: c
    code:
      type: helm
      params:
        name: "{{ .Discovery.Instance }}"
        volume: "{{ .Discovery.a.volume }}"
    dependencies: [a, b]
  - name: b
    code:
      type: helm
      params:
        replicas: '{{ default "1" .Labels.replicas }}'
    dependencies: [a]
  - name: a
    code: { type: storage }
    discovery:
      volume: "{{ .Discovery.Instance }}-vol"
---
kind: contract
metadata: { namespace: main, name: db }
contexts:
  - name: A
    criteria:
      require-all: ["priority >= 100"]
    allocation: { bundle: pg, keys: ["{{ .Labels.team }}"] }
  - name: B
    allocation: { bundle: pg, keys: ['{{ default "shared" .Labels.team }}'] }
"#;

/// Claims for [`POLICY_YAML`], kept in a separate file
pub const CLAIMS_YAML: &str = r#"---
kind: claim
metadata: { namespace: main, name: c1 }
user: alice
contract: db
labels: { target: k8s, priority: "50", team: red }
---
kind: claim
metadata: { namespace: main, name: c2 }
user: carol
contract: db
labels: { target: k8s, priority: "50", team: red }
"#;

/// Users matching [`scenario_users`]
pub const USERS_YAML: &str = r#"- name: alice
  labels: { team: red }
- name: bob
  labels: { team: blue }
- name: carol
  labels: { team: red }
- name: root
  domain-admin: true
"#;

/// A temporary directory holding `policy/`, `users.yaml` and optionally an
/// `orchard.toml`
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    /// An empty workspace
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// A workspace with the database scenario policy, its claims and users
    pub fn database() -> Self {
        let ws = Self::new();
        ws.write("policy/policy.yaml", POLICY_YAML);
        ws.write("policy/claims.yaml", CLAIMS_YAML);
        ws.write("users.yaml", USERS_YAML);
        ws
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write a file, creating parent directories
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).unwrap()
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.path(relative)).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchard_lang::{Codec, Policy};

    #[test]
    fn test_yaml_scenario_matches_builder() {
        let codec = Codec::yaml().unwrap();
        let mut objects = codec.decode(POLICY_YAML).unwrap();
        objects.extend(codec.decode(CLAIMS_YAML).unwrap());
        let from_yaml = Policy::from_objects(objects);

        let builder = db_claim(database_policy(), "c1", "alice", &[("priority", "50"), ("team", "red")]);
        let builder = db_claim(builder, "c2", "carol", &[("priority", "50"), ("team", "red")]);
        let from_code = builder.build();

        for kind_ns in ["main", "system"] {
            let a = from_yaml.namespace(kind_ns).unwrap();
            let b = from_code.namespace(kind_ns).unwrap();
            assert_eq!(a.contracts.get("db"), b.contracts.get("db"));
            assert_eq!(a.claims, b.claims);
        }
        from_yaml.validate().unwrap();
        from_code.validate().unwrap();
    }

    #[test]
    fn test_database_workspace_layout() {
        let ws = TestWorkspace::database();
        assert!(ws.exists("policy/policy.yaml"));
        assert!(ws.read("users.yaml").contains("domain-admin"));
    }
}
