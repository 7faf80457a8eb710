//! The policy: namespaces of contracts, bundles, clusters, rules and claims

use std::collections::BTreeMap;

use crate::acl::AclResolver;
use crate::bundle::Bundle;
use crate::claim::Claim;
use crate::cluster::Cluster;
use crate::contract::Contract;
use crate::error::{Error, Result};
use crate::object::{Kind, PolicyObject, split_locator};
use crate::rule::{self, Rule};
use crate::user::User;
use crate::view::PolicyView;

/// Objects of one namespace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyNamespace {
    pub name: String,
    pub contracts: BTreeMap<String, Contract>,
    pub bundles: BTreeMap<String, Bundle>,
    pub clusters: BTreeMap<String, Cluster>,
    /// Kept in insertion order; ties in weight are broken by it
    pub rules: Vec<Rule>,
    pub acl_rules: Vec<Rule>,
    pub claims: BTreeMap<String, Claim>,
}

impl PolicyNamespace {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.contracts.is_empty()
            && self.bundles.is_empty()
            && self.clusters.is_empty()
            && self.rules.is_empty()
            && self.acl_rules.is_empty()
            && self.claims.is_empty()
    }

    /// Rules sorted by weight (stable)
    pub fn sorted_rules(&self) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self.rules.iter().collect();
        rule::sort_by_weight(&mut rules);
        rules
    }
}

/// In-memory policy object graph
#[derive(Debug, Clone, Default)]
pub struct Policy {
    namespaces: BTreeMap<String, PolicyNamespace>,
    acl: AclResolver,
}

impl PartialEq for Policy {
    fn eq(&self, other: &Self) -> bool {
        self.namespaces == other.namespaces
    }
}

impl Policy {
    /// An empty policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a policy from objects, later objects replacing earlier ones
    pub fn from_objects(objects: impl IntoIterator<Item = PolicyObject>) -> Self {
        let mut policy = Self::new();
        for object in objects {
            policy.add_object(object);
        }
        policy
    }

    /// Add or replace an object. Returns true if the policy changed.
    pub fn add_object(&mut self, object: PolicyObject) -> bool {
        let meta = object.metadata().clone();
        let ns = self
            .namespaces
            .entry(meta.namespace.clone())
            .or_insert_with(|| PolicyNamespace::new(&meta.namespace));

        match object {
            PolicyObject::Contract(o) => upsert(&mut ns.contracts, &meta.name, o),
            PolicyObject::Bundle(o) => upsert(&mut ns.bundles, &meta.name, o),
            PolicyObject::Cluster(o) => upsert(&mut ns.clusters, &meta.name, o),
            PolicyObject::Claim(o) => upsert(&mut ns.claims, &meta.name, o),
            PolicyObject::Rule(o) => upsert_rule(&mut ns.rules, o),
            PolicyObject::AclRule(o) => {
                let changed = upsert_rule(&mut ns.acl_rules, o);
                if changed {
                    self.rebuild_acl();
                }
                changed
            }
        }
    }

    /// Remove an object, returning it if it existed
    pub fn remove_object(&mut self, kind: Kind, namespace: &str, name: &str) -> Option<PolicyObject> {
        let ns = self.namespaces.get_mut(namespace)?;
        let removed = match kind {
            Kind::Contract => ns.contracts.remove(name).map(PolicyObject::Contract),
            Kind::Bundle => ns.bundles.remove(name).map(PolicyObject::Bundle),
            Kind::Cluster => ns.clusters.remove(name).map(PolicyObject::Cluster),
            Kind::Claim => ns.claims.remove(name).map(PolicyObject::Claim),
            Kind::Rule => remove_rule(&mut ns.rules, name).map(PolicyObject::Rule),
            Kind::AclRule => remove_rule(&mut ns.acl_rules, name).map(PolicyObject::AclRule),
        };
        if ns.is_empty() {
            self.namespaces.remove(namespace);
        }
        if kind == Kind::AclRule && removed.is_some() {
            self.rebuild_acl();
        }
        removed
    }

    fn rebuild_acl(&mut self) {
        let rules = self
            .namespaces
            .values()
            .flat_map(|ns| ns.acl_rules.iter().cloned());
        self.acl = AclResolver::new(rules);
    }

    /// Every object, grouped by namespace and kind
    pub fn objects(&self) -> Vec<PolicyObject> {
        let mut result = Vec::new();
        for ns in self.namespaces.values() {
            for kind in Kind::ALL {
                match kind {
                    Kind::Cluster => result.extend(ns.clusters.values().cloned().map(PolicyObject::Cluster)),
                    Kind::AclRule => result.extend(ns.acl_rules.iter().cloned().map(PolicyObject::AclRule)),
                    Kind::Rule => result.extend(ns.rules.iter().cloned().map(PolicyObject::Rule)),
                    Kind::Bundle => result.extend(ns.bundles.values().cloned().map(PolicyObject::Bundle)),
                    Kind::Contract => result.extend(ns.contracts.values().cloned().map(PolicyObject::Contract)),
                    Kind::Claim => result.extend(ns.claims.values().cloned().map(PolicyObject::Claim)),
                }
            }
        }
        result
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.namespaces
            .values()
            .map(|ns| {
                ns.contracts.len()
                    + ns.bundles.len()
                    + ns.clusters.len()
                    + ns.rules.len()
                    + ns.acl_rules.len()
                    + ns.claims.len()
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &PolicyNamespace> {
        self.namespaces.values()
    }

    pub fn namespace(&self, name: &str) -> Option<&PolicyNamespace> {
        self.namespaces.get(name)
    }

    fn lookup<'a, T>(
        &'a self,
        kind: Kind,
        locator: &str,
        current_namespace: &str,
        pick: impl Fn(&'a PolicyNamespace, &str) -> Option<&'a T>,
    ) -> Result<&'a T> {
        let (ns_name, name) = split_locator(locator, current_namespace)?;
        let ns = self
            .namespaces
            .get(ns_name)
            .ok_or_else(|| Error::NamespaceNotFound {
                namespace: ns_name.to_string(),
            })?;
        pick(ns, name).ok_or_else(|| Error::ObjectNotFound {
            kind: kind.to_string(),
            locator: locator.to_string(),
            namespace: ns_name.to_string(),
        })
    }

    /// Look up a contract by `[namespace/]name`
    pub fn contract(&self, locator: &str, current_namespace: &str) -> Result<&Contract> {
        self.lookup(Kind::Contract, locator, current_namespace, |ns, n| ns.contracts.get(n))
    }

    /// Look up a bundle by `[namespace/]name`
    pub fn bundle(&self, locator: &str, current_namespace: &str) -> Result<&Bundle> {
        self.lookup(Kind::Bundle, locator, current_namespace, |ns, n| ns.bundles.get(n))
    }

    /// Look up a cluster by `[namespace/]name`
    pub fn cluster(&self, locator: &str, current_namespace: &str) -> Result<&Cluster> {
        self.lookup(Kind::Cluster, locator, current_namespace, |ns, n| ns.clusters.get(n))
    }

    /// Look up a claim by `[namespace/]name`
    pub fn claim(&self, locator: &str, current_namespace: &str) -> Result<&Claim> {
        self.lookup(Kind::Claim, locator, current_namespace, |ns, n| ns.claims.get(n))
    }

    /// Every claim, ordered by namespace then name
    pub fn claims(&self) -> impl Iterator<Item = &Claim> {
        self.namespaces.values().flat_map(|ns| ns.claims.values())
    }

    /// Rules of a namespace sorted by weight; empty if the namespace is unknown
    pub fn rules(&self, namespace: &str) -> Vec<&Rule> {
        self.namespaces
            .get(namespace)
            .map(PolicyNamespace::sorted_rules)
            .unwrap_or_default()
    }

    /// The ACL resolver built from this policy's ACL rules
    pub fn acl(&self) -> &AclResolver {
        &self.acl
    }

    /// Access-checked view of the policy for a user
    pub fn view<'a>(&'a self, user: &'a User) -> PolicyView<'a> {
        PolicyView::new(self, user)
    }
}

fn upsert<T: PartialEq>(map: &mut BTreeMap<String, T>, name: &str, value: T) -> bool {
    if map.get(name) == Some(&value) {
        return false;
    }
    map.insert(name.to_string(), value);
    true
}

fn upsert_rule(rules: &mut Vec<Rule>, value: Rule) -> bool {
    match rules.iter().position(|r| r.metadata.name == value.metadata.name) {
        Some(i) if rules[i] == value => false,
        Some(i) => {
            rules[i] = value;
            true
        }
        None => {
            rules.push(value);
            true
        }
    }
}

fn remove_rule(rules: &mut Vec<Rule>, name: &str) -> Option<Rule> {
    let i = rules.iter().position(|r| r.metadata.name == name)?;
    Some(rules.remove(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::Role;
    use crate::criteria::Criteria;
    use crate::object::{Metadata, SYSTEM_NAMESPACE};
    use crate::rule::RuleActions;

    fn contract(ns: &str, name: &str) -> PolicyObject {
        PolicyObject::Contract(Contract {
            metadata: Metadata::new(ns, name),
            ..Contract::default()
        })
    }

    #[test]
    fn test_add_object_reports_change() {
        let mut policy = Policy::new();
        assert!(policy.add_object(contract("main", "db")));
        assert!(!policy.add_object(contract("main", "db")));
        assert_eq!(policy.len(), 1);
    }

    #[test]
    fn test_lookup_by_locator() {
        let policy = Policy::from_objects([contract("main", "db"), contract("platform", "db")]);

        assert_eq!(policy.contract("db", "main").unwrap().metadata.namespace, "main");
        assert_eq!(
            policy.contract("platform/db", "main").unwrap().metadata.namespace,
            "platform"
        );
        assert!(matches!(
            policy.contract("nope/db", "main"),
            Err(Error::NamespaceNotFound { .. })
        ));
        assert!(matches!(
            policy.contract("cache", "main"),
            Err(Error::ObjectNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_object_drops_empty_namespace() {
        let mut policy = Policy::from_objects([contract("main", "db")]);
        assert!(policy.remove_object(Kind::Contract, "main", "db").is_some());
        assert!(policy.namespace("main").is_none());
        assert!(policy.remove_object(Kind::Contract, "main", "db").is_none());
    }

    #[test]
    fn test_acl_rules_rebuild_resolver() {
        let user = crate::user::User::new("u").with_label("team", "red");
        let mut policy = Policy::new();
        assert_eq!(policy.acl().role(&user, "red").unwrap(), Role::Nobody);

        policy.add_object(PolicyObject::AclRule(Rule {
            metadata: Metadata::new(SYSTEM_NAMESPACE, "red-admins"),
            weight: 1,
            criteria: Some(Criteria::all(["team == 'red'"])),
            actions: RuleActions {
                add_role: BTreeMap::from([("namespace_admin".to_string(), "red".to_string())]),
                ..RuleActions::default()
            },
        }));
        assert_eq!(policy.acl().role(&user, "red").unwrap(), Role::NamespaceAdmin);

        policy.remove_object(Kind::AclRule, SYSTEM_NAMESPACE, "red-admins");
        assert_eq!(policy.acl().role(&user, "red").unwrap(), Role::Nobody);
    }

    #[test]
    fn test_objects_round_trip() {
        let objects = vec![contract("a", "x"), contract("b", "y")];
        let policy = Policy::from_objects(objects.clone());
        assert_eq!(policy.objects(), objects);
        assert_eq!(Policy::from_objects(policy.objects()), policy);
    }
}
