//! Policy validation.
//!
//! Validation collects every issue instead of stopping at the first one, so
//! a policy update reports all problems at once.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::acl::{ALL_NAMESPACES, Role};
use crate::bundle::{BUNDLE_COMPONENT, Bundle};
use crate::criteria::Criteria;
use crate::error::{Error, Result};
use crate::object::{Kind, Metadata, SYSTEM_NAMESPACE, object_key};
use crate::params::compile_parameter_tree;
use crate::policy::{Policy, PolicyNamespace};
use crate::rule::Rule;
use crate::template::Template;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]{0,63}$").expect("Invalid identifier regex")
});

/// One problem found in a policy object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Object key, `namespace/kind/name`
    pub object: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Join issues into a single line
    pub fn join(issues: &[ValidationIssue]) -> String {
        issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.object, self.message)
    }
}

/// Whether a name is a valid identifier
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

struct Validator<'a> {
    policy: &'a Policy,
    issues: Vec<ValidationIssue>,
}

impl<'a> Validator<'a> {
    fn issue(&mut self, kind: Kind, meta: &Metadata, message: impl Into<String>) {
        self.issues
            .push(ValidationIssue::new(object_key(kind, meta), message));
    }

    fn metadata(&mut self, kind: Kind, meta: &Metadata) {
        if !is_identifier(&meta.namespace) {
            self.issue(kind, meta, format!("invalid namespace '{}'", meta.namespace));
        }
        if !is_identifier(&meta.name) {
            self.issue(kind, meta, format!("invalid name '{}'", meta.name));
        }
    }

    fn criteria(&mut self, kind: Kind, meta: &Metadata, criteria: Option<&Criteria>) {
        if let Some(Err(e)) = criteria.map(Criteria::compile) {
            self.issue(kind, meta, e.to_string());
        }
    }

    fn namespace(&mut self, ns: &'a PolicyNamespace) {
        for contract in ns.contracts.values() {
            let meta = &contract.metadata;
            self.metadata(Kind::Contract, meta);
            if contract.contexts.is_empty() {
                self.issue(Kind::Contract, meta, "contract has no contexts");
            }
            let mut seen = BTreeSet::new();
            for context in &contract.contexts {
                if !seen.insert(context.name.as_str()) {
                    self.issue(Kind::Contract, meta, format!("duplicate context name '{}'", context.name));
                }
                if !is_identifier(&context.name) {
                    self.issue(Kind::Contract, meta, format!("invalid context name '{}'", context.name));
                }
                self.criteria(Kind::Contract, meta, context.criteria.as_ref());
                if !ns.bundles.contains_key(&context.allocation.bundle) {
                    self.issue(
                        Kind::Contract,
                        meta,
                        format!(
                            "context '{}' allocates bundle '{}' which doesn't exist in namespace '{}'",
                            context.name, context.allocation.bundle, ns.name
                        ),
                    );
                }
                for key in &context.allocation.keys {
                    if let Err(e) = Template::compile(key) {
                        self.issue(Kind::Contract, meta, e.to_string());
                    }
                }
            }
        }

        for bundle in ns.bundles.values() {
            self.bundle(ns, bundle);
        }

        for cluster in ns.clusters.values() {
            let meta = &cluster.metadata;
            self.metadata(Kind::Cluster, meta);
            if meta.namespace != SYSTEM_NAMESPACE {
                self.issue(Kind::Cluster, meta, "clusters must be defined in the system namespace");
            }
            if cluster.cluster_type.is_empty() {
                self.issue(Kind::Cluster, meta, "cluster type is empty");
            }
        }

        for rule in &ns.rules {
            self.rule(Kind::Rule, rule);
            if !rule.actions.add_role.is_empty() {
                self.issue(Kind::Rule, &rule.metadata, "add-role is only allowed in ACL rules");
            }
        }

        for rule in &ns.acl_rules {
            self.acl_rule(rule);
        }

        for claim in ns.claims.values() {
            let meta = &claim.metadata;
            self.metadata(Kind::Claim, meta);
            if claim.user.is_empty() {
                self.issue(Kind::Claim, meta, "claim has no user");
            }
            if let Err(e) = self.policy.contract(&claim.contract, &ns.name) {
                self.issue(Kind::Claim, meta, e.to_string());
            }
        }
    }

    fn bundle(&mut self, ns: &PolicyNamespace, bundle: &Bundle) {
        let meta = &bundle.metadata;
        self.metadata(Kind::Bundle, meta);

        for component in &bundle.components {
            if !is_identifier(&component.name) {
                self.issue(Kind::Bundle, meta, format!("invalid component name '{}'", component.name));
            }
            if component.name == BUNDLE_COMPONENT {
                self.issue(
                    Kind::Bundle,
                    meta,
                    format!("component name '{}' is reserved", BUNDLE_COMPONENT),
                );
            }
            match (&component.code, &component.contract) {
                (Some(_), Some(_)) | (None, None) => self.issue(
                    Kind::Bundle,
                    meta,
                    format!(
                        "component '{}' must have exactly one of code or contract",
                        component.name
                    ),
                ),
                (Some(code), None) => {
                    if code.code_type.is_empty() {
                        self.issue(
                            Kind::Bundle,
                            meta,
                            format!("component '{}' has an empty code type", component.name),
                        );
                    }
                    if let Err(e) = compile_parameter_tree(&code.params) {
                        self.issue(Kind::Bundle, meta, e.to_string());
                    }
                }
                (None, Some(contract)) => {
                    if let Err(e) = self.policy.contract(contract, &ns.name) {
                        self.issue(Kind::Bundle, meta, e.to_string());
                    }
                }
            }
            self.criteria(Kind::Bundle, meta, component.criteria.as_ref());
            if let Err(e) = compile_parameter_tree(&component.discovery) {
                self.issue(Kind::Bundle, meta, e.to_string());
            }
        }

        // reports duplicate names, dangling dependencies and cycles
        if let Err(e) = bundle.sorted_components() {
            self.issue(Kind::Bundle, meta, e.to_string());
        }
    }

    fn rule(&mut self, kind: Kind, rule: &Rule) {
        self.metadata(kind, &rule.metadata);
        self.criteria(kind, &rule.metadata, rule.criteria.as_ref());
        if rule.actions.is_empty() {
            self.issue(kind, &rule.metadata, "rule has no actions");
        }
    }

    fn acl_rule(&mut self, rule: &Rule) {
        let meta = &rule.metadata;
        self.rule(Kind::AclRule, rule);
        if meta.namespace != SYSTEM_NAMESPACE {
            self.issue(Kind::AclRule, meta, "ACL rules must be defined in the system namespace");
        }
        if rule.actions.add_role.is_empty() {
            self.issue(Kind::AclRule, meta, "ACL rule must have add-role action");
        }
        for (role, namespaces) in &rule.actions.add_role {
            if Role::from_id(role).is_none() {
                self.issue(Kind::AclRule, meta, format!("unknown role '{}'", role));
            }
            for ns in namespaces.split(',').map(str::trim) {
                if ns != ALL_NAMESPACES && !is_identifier(ns) {
                    self.issue(
                        Kind::AclRule,
                        meta,
                        format!("invalid namespace '{}' for role '{}'", ns, role),
                    );
                }
            }
        }
    }
}

/// Collect every issue in the policy
pub fn validate(policy: &Policy) -> Vec<ValidationIssue> {
    let mut validator = Validator {
        policy,
        issues: Vec::new(),
    };
    for ns in policy.namespaces() {
        validator.namespace(ns);
    }
    validator.issues
}

impl Policy {
    /// Validate the policy, failing with every issue found
    pub fn validate(&self) -> Result<()> {
        let issues = validate(self);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation { issues })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Component;
    use crate::claim::Claim;
    use crate::contract::{Allocation, Context, Contract};
    use crate::object::PolicyObject;
    use crate::rule::RuleActions;
    use rstest::rstest;
    use std::collections::BTreeMap;

    fn base() -> Vec<PolicyObject> {
        vec![
            PolicyObject::Bundle(Bundle {
                metadata: Metadata::new("main", "pg"),
                components: vec![Component::code("db", "helm")],
                ..Bundle::default()
            }),
            PolicyObject::Contract(Contract {
                metadata: Metadata::new("main", "db"),
                contexts: vec![Context {
                    name: "default".to_string(),
                    allocation: Allocation {
                        bundle: "pg".to_string(),
                        keys: vec![],
                    },
                    ..Context::default()
                }],
                ..Contract::default()
            }),
        ]
    }

    fn issues_with(extra: PolicyObject) -> Vec<ValidationIssue> {
        let mut objects = base();
        objects.push(extra);
        validate(&Policy::from_objects(objects))
    }

    #[rstest]
    #[case("1abc", false)]
    #[case("abc", true)]
    #[case("a-b_c9", true)]
    #[case("a.b", false)]
    #[case("", false)]
    fn test_identifier(#[case] name: &str, #[case] ok: bool) {
        assert_eq!(is_identifier(name), ok);
        assert!(!is_identifier(&"a".repeat(65)));
    }

    #[test]
    fn test_valid_policy() {
        assert!(Policy::from_objects(base()).validate().is_ok());
    }

    #[test]
    fn test_component_cycle_is_reported() {
        let issues = issues_with(PolicyObject::Bundle(Bundle {
            metadata: Metadata::new("main", "loop"),
            components: vec![
                Component::code("a", "t").depends_on(["b"]),
                Component::code("b", "t").depends_on(["a"]),
            ],
            ..Bundle::default()
        }));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("cycle"), "{}", issues[0]);
    }

    #[test]
    fn test_component_needs_code_or_contract() {
        let issues = issues_with(PolicyObject::Bundle(Bundle {
            metadata: Metadata::new("main", "empty"),
            components: vec![Component {
                name: "x".to_string(),
                ..Component::default()
            }],
            ..Bundle::default()
        }));
        assert!(issues.iter().any(|i| i.message.contains("exactly one")));
    }

    #[test]
    fn test_reserved_component_name() {
        let issues = issues_with(PolicyObject::Bundle(Bundle {
            metadata: Metadata::new("main", "shadow"),
            components: vec![Component::code("root", "helm")],
            ..Bundle::default()
        }));
        assert_eq!(issues.len(), 1, "{:?}", issues);
        assert_eq!(issues[0].message, "component name 'root' is reserved");
    }

    #[test]
    fn test_claim_with_missing_contract() {
        let issues = issues_with(PolicyObject::Claim(Claim {
            metadata: Metadata::new("main", "c"),
            user: "alice".to_string(),
            contract: "cache".to_string(),
            ..Claim::default()
        }));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].object, "main/claim/c");
    }

    #[test]
    fn test_acl_rule_checks() {
        let issues = issues_with(PolicyObject::AclRule(Rule {
            metadata: Metadata::new("main", "grant"),
            weight: 1,
            criteria: Some(Criteria::all(["(broken"])),
            actions: RuleActions {
                add_role: BTreeMap::from([("superuser".to_string(), "a,b c".to_string())]),
                ..RuleActions::default()
            },
        }));
        let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(issues.len(), 4, "{:?}", messages);
        assert!(messages.iter().any(|m| m.contains("system namespace")));
        assert!(messages.iter().any(|m| m.contains("unknown role")));
        assert!(messages.iter().any(|m| m.contains("invalid namespace 'b c'")));
    }

    #[test]
    fn test_validation_error_lists_issues() {
        let mut objects = base();
        objects.push(PolicyObject::Rule(Rule {
            metadata: Metadata::new("main", "noop"),
            ..Rule::default()
        }));
        let err = Policy::from_objects(objects).validate().unwrap_err();
        assert!(err.to_string().contains("main/rule/noop: rule has no actions"), "{}", err);
    }
}
