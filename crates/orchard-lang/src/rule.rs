//! Weighted rules and their actions.
//!
//! Rules are evaluated in ascending weight order against a label set. Every
//! rule whose criteria match applies its actions to a [`RuleActionResult`].
//! Ties in weight keep declaration order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::criteria::{self, Criteria};
use crate::error::{Error, Result};
use crate::expression::{ExpressionCache, Params};
use crate::labels::{LabelOperations, LabelSet, Labels};
use crate::object::Metadata;

/// Allow or reject decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Reject,
}

/// A weighted rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub metadata: Metadata,

    #[serde(default)]
    pub weight: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Criteria>,

    #[serde(default)]
    pub actions: RuleActions,
}

/// What a matching rule does
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RuleActions {
    #[serde(default, skip_serializing_if = "LabelOperations::is_empty")]
    pub change_labels: LabelOperations,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<Decision>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<Decision>,

    /// Role id to comma separated namespaces (or `*`); ACL rules only
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add_role: BTreeMap<String, String>,

    /// Stop evaluating further rules once this one matched
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stop: bool,
}

impl RuleActions {
    /// Whether the rule would do nothing when matched
    pub fn is_empty(&self) -> bool {
        self.change_labels.is_empty()
            && self.claim.is_none()
            && self.ingress.is_none()
            && self.add_role.is_empty()
            && !self.stop
    }
}

/// Accumulated outcome of a rule run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleActionResult {
    pub labels: LabelSet,
    pub claim_rejected: bool,
    pub ingress_allowed: bool,
    /// Role id to the namespaces it was granted in
    pub roles: BTreeMap<String, BTreeSet<String>>,
    /// Names of the rules that matched, in evaluation order
    pub matched: Vec<String>,
}

impl RuleActionResult {
    pub fn new(labels: LabelSet) -> Self {
        Self {
            labels,
            claim_rejected: false,
            ingress_allowed: true,
            roles: BTreeMap::new(),
            matched: Vec::new(),
        }
    }
}

impl Rule {
    /// Apply the rule's actions to the accumulator
    pub fn apply_actions(&self, result: &mut RuleActionResult) {
        result.labels.apply_transform(&self.actions.change_labels);
        match self.actions.claim {
            Some(Decision::Reject) => result.claim_rejected = true,
            Some(Decision::Allow) => result.claim_rejected = false,
            None => {}
        }
        match self.actions.ingress {
            Some(Decision::Reject) => result.ingress_allowed = false,
            Some(Decision::Allow) => result.ingress_allowed = true,
            None => {}
        }
        for (role, namespaces) in &self.actions.add_role {
            let granted = result.roles.entry(role.clone()).or_default();
            granted.extend(
                namespaces
                    .split(',')
                    .map(str::trim)
                    .filter(|ns| !ns.is_empty())
                    .map(str::to_string),
            );
        }
        result.matched.push(self.metadata.name.clone());
    }
}

/// Stable sort by ascending weight
pub fn sort_by_weight(rules: &mut [&Rule]) {
    rules.sort_by_key(|r| r.weight);
}

/// Run rules (already sorted) against the accumulator.
///
/// `params` builds expression parameters from the current labels, so rules
/// see the label changes made by earlier rules. Evaluation halts after a
/// rule with `stop`, or once the claim has been rejected.
pub fn apply_rules<'a, F>(
    rules: impl IntoIterator<Item = &'a Rule>,
    result: &mut RuleActionResult,
    cache: &ExpressionCache,
    mut params: F,
) -> Result<()>
where
    F: FnMut(&Labels) -> Params,
{
    for rule in rules {
        let p = params(result.labels.labels());
        let matched = criteria::matches(rule.criteria.as_ref(), &p, cache).map_err(|e| {
            Error::RuleEvaluation {
                rule: rule.metadata.name.clone(),
                source: Box::new(e),
            }
        })?;
        if !matched {
            continue;
        }

        tracing::trace!(rule = %rule.metadata.name, weight = rule.weight, "rule matched");
        rule.apply_actions(result);

        if result.claim_rejected || rule.actions.stop {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rule(name: &str, weight: i32, expr: Option<&str>, actions: RuleActions) -> Rule {
        Rule {
            metadata: Metadata::new("main", name),
            weight,
            criteria: expr.map(|e| Criteria::all([e])),
            actions,
        }
    }

    fn set_label(k: &str, v: &str) -> RuleActions {
        RuleActions {
            change_labels: LabelOperations::set([(k, v)]),
            ..RuleActions::default()
        }
    }

    fn run(rules: &[Rule], labels: &[(&str, &str)]) -> RuleActionResult {
        let mut sorted: Vec<&Rule> = rules.iter().collect();
        sort_by_weight(&mut sorted);
        let labels = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut result = RuleActionResult::new(LabelSet::new(labels));
        apply_rules(sorted, &mut result, &ExpressionCache::new(), Params::from_labels).unwrap();
        result
    }

    #[test]
    fn test_rules_run_in_weight_order_and_see_earlier_changes() {
        let rules = vec![
            rule("second", 20, Some("stage == 'one'"), set_label("stage", "two")),
            rule("first", 10, None, set_label("stage", "one")),
        ];
        let result = run(&rules, &[]);
        assert_eq!(result.labels.get("stage"), Some("two"));
        assert_eq!(result.matched, vec!["first", "second"]);
    }

    #[test]
    fn test_equal_weights_keep_declaration_order() {
        let rules = vec![
            rule("a", 5, None, set_label("x", "a")),
            rule("b", 5, None, set_label("x", "b")),
            rule("c", 5, None, set_label("x", "c")),
        ];
        let result = run(&rules, &[]);
        assert_eq!(result.labels.get("x"), Some("c"));
        assert_eq!(result.matched, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reject_stops_evaluation() {
        let reject = RuleActions {
            claim: Some(Decision::Reject),
            ..RuleActions::default()
        };
        let rules = vec![
            rule("deny-dev", 1, Some("env == 'dev'"), reject),
            rule("later", 2, None, set_label("seen", "yes")),
        ];

        let result = run(&rules, &[("env", "dev")]);
        assert!(result.claim_rejected);
        assert_eq!(result.labels.get("seen"), None);

        let result = run(&rules, &[("env", "prod")]);
        assert!(!result.claim_rejected);
        assert_eq!(result.labels.get("seen"), Some("yes"));
    }

    #[test]
    fn test_stop_flag_halts_evaluation() {
        let mut stop = set_label("a", "1");
        stop.stop = true;
        let rules = vec![rule("stop", 1, None, stop), rule("after", 2, None, set_label("b", "1"))];
        let result = run(&rules, &[]);
        assert_eq!(result.labels.get("a"), Some("1"));
        assert_eq!(result.labels.get("b"), None);
    }

    #[test]
    fn test_add_role_accumulates_namespaces() {
        let grant = |ns: &str| RuleActions {
            add_role: BTreeMap::from([("namespace_admin".to_string(), ns.to_string())]),
            ..RuleActions::default()
        };
        let rules = vec![rule("r1", 1, None, grant("a, b")), rule("r2", 2, None, grant("c"))];
        let result = run(&rules, &[]);
        let granted: Vec<&str> = result.roles["namespace_admin"].iter().map(String::as_str).collect();
        assert_eq!(granted, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ingress_reject() {
        let rules = vec![rule(
            "no-ingress",
            1,
            None,
            RuleActions {
                ingress: Some(Decision::Reject),
                ..RuleActions::default()
            },
        )];
        assert!(!run(&rules, &[]).ingress_allowed);
        assert!(run(&[], &[]).ingress_allowed);
    }

    #[test]
    fn test_broken_criteria_names_the_rule() {
        let rules = vec![rule("broken", 1, Some("env + 1"), set_label("a", "b"))];
        let mut result = RuleActionResult::new(LabelSet::new(Labels::from([(
            "env".to_string(),
            "x".to_string(),
        )])));
        let sorted: Vec<&Rule> = rules.iter().collect();
        let err = apply_rules(sorted, &mut result, &ExpressionCache::new(), Params::from_labels)
            .unwrap_err();
        assert!(err.to_string().contains("broken"), "got: {}", err);
    }
}
