//! Policy language for orchard
//!
//! This crate holds everything needed to describe and check policy, with no
//! knowledge of how it gets resolved or deployed:
//!
//! - **Expressions**: boolean label expressions with a thread-safe compile cache
//! - **Templates**: parameter templates with a `default` function and a compile cache
//! - **Criteria**: require-all / require-none / require-any expression lists
//! - **Policy model**: namespaces of contracts, bundles, clusters, rules, ACL
//!   rules and claims, with lookup by `[namespace/]name` locators
//! - **Rules and ACL**: weighted rules producing label changes, claim
//!   decisions and role grants; per-user role resolution and privileges
//! - **Validation and codec**: policy checks, a kind registry and YAML/JSON
//!   encoding
//!
//! # Architecture
//!
//! ```text
//!            codec (kind registry)
//!                    |
//!     policy ---- view (ACL checked)
//!       |             |
//!  contract  bundle  rule ---- acl
//!       \      |      /
//!        criteria  params
//!           |        |
//!      expression  template
//! ```

pub mod acl;
pub mod bundle;
pub mod claim;
pub mod cluster;
pub mod codec;
pub mod contract;
pub mod criteria;
pub mod error;
pub mod expression;
pub mod labels;
pub mod object;
pub mod params;
pub mod policy;
pub mod rule;
pub mod template;
pub mod user;
pub mod validation;
pub mod view;

pub use acl::{AclResolver, Privilege, Role, bootstrap_rules};
pub use bundle::{Bundle, Code, Component};
pub use claim::Claim;
pub use cluster::{Cluster, TARGET_LABEL, Target};
pub use codec::{Codec, Format, KindRegistry, load_dir};
pub use contract::{Allocation, Context, Contract};
pub use criteria::Criteria;
pub use error::{Error, Result};
pub use expression::{Expression, ExpressionCache, Params};
pub use labels::{LabelOperations, LabelSet, Labels};
pub use object::{Kind, Metadata, PolicyObject, SYSTEM_NAMESPACE};
pub use params::ParameterTree;
pub use policy::{Policy, PolicyNamespace};
pub use rule::{Decision, Rule, RuleActionResult, RuleActions};
pub use template::{Template, TemplateCache, TemplateParams};
pub use user::{StaticUserLoader, User, UserLoader};
pub use validation::ValidationIssue;
pub use view::PolicyView;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = Error::Validation {
            issues: vec![
                ValidationIssue::new("main/claim/a", "claim has no user"),
                ValidationIssue::new("main/bundle/b", "bundle is broken"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "policy validation failed with 2 issue(s): main/claim/a: claim has no user; main/bundle/b: bundle is broken"
        );
    }

    #[test]
    fn test_access_denied_display() {
        let err = Error::AccessDenied {
            user: "alice".to_string(),
            action: "manage",
            object: "claim 'main/c1'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "user 'alice' doesn't have ACL permissions to manage claim 'main/c1'"
        );
    }
}
