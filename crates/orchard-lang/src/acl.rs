//! ACL roles, privileges and the per-user role resolver.
//!
//! ACL rules live in the system namespace. Evaluated against a user's labels
//! they grant roles in namespaces via `add-role`. A privilege lookup walks
//! the roles from most to least privileged and picks the first one granted
//! in the object's namespace (or in `*`). Users without any grant get
//! [`Role::Nobody`]. Users flagged as domain admins bypass the rules.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dashmap::DashMap;

use crate::criteria::Criteria;
use crate::error::{Error, Result};
use crate::expression::{ExpressionCache, Params};
use crate::labels::LabelSet;
use crate::object::{Kind, Metadata, SYSTEM_NAMESPACE};
use crate::rule::{self, Rule, RuleActionResult, RuleActions};
use crate::user::User;

/// Namespace grant meaning "every namespace"
pub const ALL_NAMESPACES: &str = "*";

/// Built-in roles, declared from most to least privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    DomainAdmin,
    NamespaceAdmin,
    ServiceConsumer,
    Nobody,
}

impl Role {
    /// Every role, most privileged first
    pub const ORDERED: [Role; 4] = [
        Role::DomainAdmin,
        Role::NamespaceAdmin,
        Role::ServiceConsumer,
        Role::Nobody,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Role::DomainAdmin => "domain_admin",
            Role::NamespaceAdmin => "namespace_admin",
            Role::ServiceConsumer => "service_consumer",
            Role::Nobody => "nobody",
        }
    }

    pub fn from_id(id: &str) -> Option<Role> {
        Role::ORDERED.into_iter().find(|r| r.id() == id)
    }

    /// Privileges of this role over `kind`, for objects in the system
    /// namespace (`system == true`) or in a regular namespace
    pub fn privilege(&self, kind: Kind, system: bool) -> Privilege {
        use Kind::*;
        match (self, system, kind) {
            (Role::DomainAdmin, false, Contract | Bundle | Claim | Rule) => Privilege::FULL,
            (Role::DomainAdmin, true, Cluster | Rule | AclRule) => Privilege::FULL,

            (Role::NamespaceAdmin, false, Contract | Bundle | Claim | Rule) => Privilege::FULL,
            (Role::NamespaceAdmin, true, Cluster | Rule | AclRule) => Privilege::VIEW,

            (Role::ServiceConsumer, false, Claim) => Privilege::FULL,
            (Role::ServiceConsumer, false, Contract | Bundle | Rule) => Privilege::VIEW,
            (Role::ServiceConsumer, true, Cluster | Rule | AclRule) => Privilege::VIEW,

            (Role::Nobody, false, Contract | Bundle | Claim | Rule) => Privilege::VIEW,
            (Role::Nobody, true, Cluster | Rule | AclRule) => Privilege::VIEW,

            _ => Privilege::NONE,
        }
    }
}

/// View/manage privilege pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Privilege {
    pub view: bool,
    pub manage: bool,
}

impl Privilege {
    pub const FULL: Privilege = Privilege {
        view: true,
        manage: true,
    };
    pub const VIEW: Privilege = Privilege {
        view: true,
        manage: false,
    };
    pub const NONE: Privilege = Privilege {
        view: false,
        manage: false,
    };
}

/// Namespaces each role was granted in
pub type RoleMap = BTreeMap<Role, BTreeSet<String>>;

/// Rules granting `domain_admin` everywhere to users labelled
/// `role=orchard_domain_admin`
pub fn bootstrap_rules() -> Vec<Rule> {
    vec![Rule {
        metadata: Metadata::new(SYSTEM_NAMESPACE, "bootstrap-domain-admin"),
        weight: 0,
        criteria: Some(Criteria::all(["role == 'orchard_domain_admin'"])),
        actions: RuleActions {
            add_role: BTreeMap::from([(
                Role::DomainAdmin.id().to_string(),
                ALL_NAMESPACES.to_string(),
            )]),
            ..RuleActions::default()
        },
    }]
}

/// Resolves users to roles and privileges; caches the role map per user
#[derive(Debug, Default)]
pub struct AclResolver {
    rules: Vec<Rule>,
    expressions: ExpressionCache,
    roles: DashMap<String, Arc<RoleMap>>,
}

impl AclResolver {
    /// Build a resolver over ACL rules; ties in weight keep the given order
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        let mut rules: Vec<Rule> = rules.into_iter().collect();
        rules.sort_by_key(|r| r.weight);
        Self {
            rules,
            expressions: ExpressionCache::new(),
            roles: DashMap::new(),
        }
    }

    /// The rules, sorted by weight
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Drop every cached role map
    pub fn invalidate(&self) {
        self.roles.clear();
    }

    /// Roles granted to a user, computed once per user name
    pub fn role_map(&self, user: &User) -> Result<Arc<RoleMap>> {
        if let Some(cached) = self.roles.get(&user.name) {
            return Ok(Arc::clone(cached.value()));
        }

        let mut result = RuleActionResult::new(LabelSet::new(user.labels.clone()));
        rule::apply_rules(&self.rules, &mut result, &self.expressions, Params::from_labels)
            .map_err(|e| Error::RoleResolution {
                user: user.name.clone(),
                source: Box::new(e),
            })?;

        let mut map = RoleMap::new();
        for (id, namespaces) in result.roles {
            match Role::from_id(&id) {
                Some(role) => {
                    map.entry(role).or_default().extend(namespaces);
                }
                None => tracing::warn!(user = %user.name, role = %id, "ignoring unknown role"),
            }
        }
        tracing::debug!(user = %user.name, roles = ?map, "resolved user roles");

        let map = Arc::new(map);
        self.roles.insert(user.name.clone(), Arc::clone(&map));
        Ok(map)
    }

    /// Effective role of a user in a namespace
    pub fn role(&self, user: &User, namespace: &str) -> Result<Role> {
        if user.domain_admin {
            return Ok(Role::DomainAdmin);
        }
        let map = self.role_map(user)?;
        let granted = Role::ORDERED.into_iter().find(|role| {
            map.get(role).is_some_and(|namespaces| {
                namespaces.contains(ALL_NAMESPACES) || namespaces.contains(namespace)
            })
        });
        Ok(granted.unwrap_or(Role::Nobody))
    }

    /// Privileges of a user over an object of `kind` in `namespace`
    pub fn privilege(&self, user: &User, kind: Kind, namespace: &str) -> Result<Privilege> {
        if user.domain_admin {
            return Ok(Privilege::FULL);
        }
        let role = self.role(user, namespace)?;
        Ok(role.privilege(kind, namespace == SYSTEM_NAMESPACE))
    }
}

impl Clone for AclResolver {
    fn clone(&self) -> Self {
        Self::new(self.rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn grant(name: &str, weight: i32, expr: &str, role: &str, namespaces: &str) -> Rule {
        Rule {
            metadata: Metadata::new(SYSTEM_NAMESPACE, name),
            weight,
            criteria: Some(Criteria::all([expr])),
            actions: RuleActions {
                add_role: BTreeMap::from([(role.to_string(), namespaces.to_string())]),
                ..RuleActions::default()
            },
        }
    }

    fn resolver() -> AclResolver {
        let mut rules = bootstrap_rules();
        rules.push(grant("team-admins", 10, "team == 'red'", "namespace_admin", "red"));
        rules.push(grant("consumers", 20, "true", "service_consumer", "red,blue"));
        AclResolver::new(rules)
    }

    #[rstest]
    #[case(&[("team", "red")], "red", Role::NamespaceAdmin)]
    #[case(&[("team", "red")], "blue", Role::ServiceConsumer)]
    #[case(&[("team", "blue")], "red", Role::ServiceConsumer)]
    #[case(&[], "green", Role::Nobody)]
    #[case(&[("role", "orchard_domain_admin")], "green", Role::DomainAdmin)]
    fn test_role_resolution(
        #[case] labels: &[(&str, &str)],
        #[case] namespace: &str,
        #[case] expected: Role,
    ) {
        let mut user = User::new("u");
        for (k, v) in labels {
            user = user.with_label(*k, *v);
        }
        assert_eq!(resolver().role(&user, namespace).unwrap(), expected);
    }

    #[test]
    fn test_domain_admin_flag_overrides_rules() {
        let acl = AclResolver::new(Vec::new());
        let admin = User {
            domain_admin: true,
            ..User::new("root")
        };
        for kind in Kind::ALL {
            for ns in ["main", SYSTEM_NAMESPACE, "anything"] {
                assert_eq!(acl.privilege(&admin, kind, ns).unwrap(), Privilege::FULL);
            }
        }
    }

    #[test]
    fn test_privilege_tables() {
        assert_eq!(Role::ServiceConsumer.privilege(Kind::Claim, false), Privilege::FULL);
        assert_eq!(Role::ServiceConsumer.privilege(Kind::Bundle, false), Privilege::VIEW);
        assert_eq!(Role::NamespaceAdmin.privilege(Kind::Cluster, true), Privilege::VIEW);
        assert_eq!(Role::DomainAdmin.privilege(Kind::Cluster, true), Privilege::FULL);
        // clusters outside the system namespace are never accessible
        assert_eq!(Role::DomainAdmin.privilege(Kind::Cluster, false), Privilege::NONE);
    }

    #[test]
    fn test_role_map_is_cached_until_invalidated() {
        let acl = resolver();
        let user = User::new("u").with_label("team", "red");
        let first = acl.role_map(&user).unwrap();
        let second = acl.role_map(&user).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        acl.invalidate();
        let third = acl.role_map(&user).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(first, third);
    }
}
