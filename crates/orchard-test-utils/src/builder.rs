//! [`PolicyBuilder`] for assembling policies in tests.

use std::collections::BTreeMap;

use orchard_lang::acl::Role;
use orchard_lang::rule::RuleActions;
use orchard_lang::{
    Allocation, Bundle, Claim, Cluster, Component, Context, Contract, Criteria, Labels, Metadata,
    Policy, PolicyObject, Rule, SYSTEM_NAMESPACE, User,
};

/// Collects policy objects and turns them into a [`Policy`].
///
/// # Example
///
/// ```rust
/// use orchard_test_utils::{PolicyBuilder, context};
/// use orchard_lang::Component;
///
/// let policy = PolicyBuilder::new()
///     .cluster("k8s", "kubernetes")
///     .consumers("main")
///     .bundle("main", "pg", vec![Component::code("db", "helm")])
///     .contract("main", "db", vec![context("default", None, "pg", &[])])
///     .claim("main", "c1", "alice", "db", &[("target", "k8s")])
///     .build();
/// assert_eq!(policy.claims().count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PolicyBuilder {
    objects: Vec<PolicyObject>,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(mut self, object: PolicyObject) -> Self {
        self.objects.push(object);
        self
    }

    /// A cluster in the system namespace
    pub fn cluster(self, name: &str, cluster_type: &str) -> Self {
        self.object(PolicyObject::Cluster(Cluster {
            metadata: Metadata::new(SYSTEM_NAMESPACE, name),
            cluster_type: cluster_type.to_string(),
            labels: Labels::new(),
            config: Default::default(),
        }))
    }

    /// ACL rule making every user a service consumer in `namespace`
    pub fn consumers(self, namespace: &str) -> Self {
        self.acl_rule(
            &format!("consumers-{}", namespace),
            100,
            None,
            Role::ServiceConsumer,
            namespace,
        )
    }

    /// ACL rule granting `role` in `namespaces` to users matching `criteria`
    pub fn acl_rule(
        self,
        name: &str,
        weight: i32,
        criteria: Option<&str>,
        role: Role,
        namespaces: &str,
    ) -> Self {
        self.object(PolicyObject::AclRule(Rule {
            metadata: Metadata::new(SYSTEM_NAMESPACE, name),
            weight,
            criteria: criteria.map(|c| Criteria::all([c])),
            actions: RuleActions {
                add_role: BTreeMap::from([(role.id().to_string(), namespaces.to_string())]),
                ..RuleActions::default()
            },
        }))
    }

    pub fn rule(
        self,
        namespace: &str,
        name: &str,
        weight: i32,
        criteria: Option<&str>,
        actions: RuleActions,
    ) -> Self {
        self.object(PolicyObject::Rule(Rule {
            metadata: Metadata::new(namespace, name),
            weight,
            criteria: criteria.map(|c| Criteria::all([c])),
            actions,
        }))
    }

    pub fn bundle(self, namespace: &str, name: &str, components: Vec<Component>) -> Self {
        self.object(PolicyObject::Bundle(Bundle {
            metadata: Metadata::new(namespace, name),
            labels: Labels::new(),
            components,
        }))
    }

    pub fn contract(self, namespace: &str, name: &str, contexts: Vec<Context>) -> Self {
        self.object(PolicyObject::Contract(Contract {
            metadata: Metadata::new(namespace, name),
            change_labels: Default::default(),
            contexts,
        }))
    }

    pub fn claim(
        self,
        namespace: &str,
        name: &str,
        user: &str,
        contract: &str,
        labels: &[(&str, &str)],
    ) -> Self {
        self.object(PolicyObject::Claim(Claim {
            metadata: Metadata::new(namespace, name),
            user: user.to_string(),
            contract: contract.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }))
    }

    pub fn objects(&self) -> &[PolicyObject] {
        &self.objects
    }

    pub fn build(self) -> Policy {
        Policy::from_objects(self.objects)
    }
}

/// A contract context allocating `bundle`, optionally guarded by one
/// require-all expression
pub fn context(name: &str, criteria: Option<&str>, bundle: &str, keys: &[&str]) -> Context {
    Context {
        name: name.to_string(),
        criteria: criteria.map(|c| Criteria::all([c])),
        change_labels: Default::default(),
        allocation: Allocation {
            bundle: bundle.to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        },
    }
}

/// Users keyed by name
pub fn users(users: impl IntoIterator<Item = User>) -> BTreeMap<String, User> {
    users.into_iter().map(|u| (u.name.clone(), u)).collect()
}
