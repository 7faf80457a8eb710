//! Computing an action plan from two snapshots

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::action::Action;
use crate::resolve::{ComponentInstanceKey, PolicyResolution};

/// Actions on a single instance, run in order, plus the steps that must
/// complete before this one starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub key: ComponentInstanceKey,
    pub actions: Vec<Action>,
    pub after: BTreeSet<ComponentInstanceKey>,
}

/// Ordered list of steps turning the actual state into the desired one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub steps: Vec<PlanStep>,
}

impl ActionPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of actions across all steps
    pub fn len(&self) -> usize {
        self.steps.iter().map(|s| s.actions.len()).sum()
    }

    /// Every action in plan order
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.steps.iter().flat_map(|s| s.actions.iter())
    }

    pub fn step(&self, key: &ComponentInstanceKey) -> Option<&PlanStep> {
        self.steps.iter().find(|s| &s.key == key)
    }
}

/// Compute the plan turning `actual` into `desired`.
///
/// Keys missing from `actual` (or present there with no claims while
/// `desired` has some) are created, keys missing from `desired` are deleted,
/// changed code parameters cause an update of the instance and of its parent
/// bundle. Claim keys are attached and detached one by one. Endpoints are
/// refreshed after a create or update, and again while the actual instance
/// is marked stale. Creates and
/// updates follow the desired processing order; deletes follow the actual
/// processing order reversed.
pub fn diff(desired: &PolicyResolution, actual: &PolicyResolution) -> ActionPlan {
    let mut actions: BTreeMap<ComponentInstanceKey, Vec<Action>> = BTreeMap::new();
    let mut updated_bundles = BTreeSet::new();

    let desired_order = desired.processing_order();
    for key in &desired_order {
        let Some(want) = desired.instance(key) else {
            continue;
        };
        let have = actual.instance(key);
        let mut step = Vec::new();

        let fresh = match have {
            None => true,
            Some(have) => have.claim_keys.is_empty() && !want.claim_keys.is_empty(),
        };

        if fresh {
            step.push(Action::Create { key: key.clone() });
            for claim in &want.claim_keys {
                step.push(Action::AttachClaim {
                    key: key.clone(),
                    claim: claim.clone(),
                });
            }
            if want.is_code {
                step.push(Action::RefreshEndpoints { key: key.clone() });
            }
        } else if let Some(have) = have {
            let changed = want.code_params != have.code_params;
            if changed {
                step.push(Action::Update { key: key.clone() });
                if !key.is_bundle() {
                    updated_bundles.insert(key.bundle_key());
                }
            }
            for claim in have.claim_keys.difference(&want.claim_keys) {
                step.push(Action::DetachClaim {
                    key: key.clone(),
                    claim: claim.clone(),
                });
            }
            for claim in want.claim_keys.difference(&have.claim_keys) {
                step.push(Action::AttachClaim {
                    key: key.clone(),
                    claim: claim.clone(),
                });
            }
            if want.is_code && (changed || have.endpoints_stale) {
                step.push(Action::RefreshEndpoints { key: key.clone() });
            }
        }

        if !step.is_empty() {
            actions.insert(key.clone(), step);
        }
    }

    for bundle in updated_bundles {
        if desired.instance(&bundle).is_none() || actual.instance(&bundle).is_none() {
            continue;
        }
        let step = actions.entry(bundle.clone()).or_default();
        let covered = step
            .iter()
            .any(|a| matches!(a, Action::Create { .. } | Action::Update { .. }));
        if !covered {
            step.insert(0, Action::Update { key: bundle });
        }
    }

    let mut deleted = Vec::new();
    for key in actual.processing_order().into_iter().rev() {
        if desired.instance(&key).is_some() {
            continue;
        }
        let Some(have) = actual.instance(&key) else {
            continue;
        };
        let mut step: Vec<Action> = have
            .claim_keys
            .iter()
            .map(|claim| Action::DetachClaim {
                key: key.clone(),
                claim: claim.clone(),
            })
            .collect();
        step.push(Action::Delete { key: key.clone() });
        actions.insert(key.clone(), step);
        deleted.push(key);
    }

    let planned: BTreeSet<ComponentInstanceKey> = actions.keys().cloned().collect();
    let ordered = desired_order
        .into_iter()
        .filter(|k| planned.contains(k))
        .chain(deleted);

    let mut steps = Vec::with_capacity(planned.len());
    for key in ordered {
        let Some(step_actions) = actions.remove(&key) else {
            continue;
        };
        let after = if desired.instance(&key).is_some() {
            desired
                .dependencies(&key)
                .filter(|k| planned.contains(*k))
                .cloned()
                .collect()
        } else {
            actual
                .dependents(&key)
                .filter(|k| planned.contains(*k))
                .cloned()
                .collect()
        };
        steps.push(PlanStep {
            key,
            actions: step_actions,
            after,
        });
    }

    ActionPlan { steps }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ComponentInstance;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn key(component: &str) -> ComponentInstanceKey {
        format!("system#k8s#unknown#main#db#ctx#pg#{}", component)
            .parse()
            .unwrap()
    }

    /// Entries are (component, version, comma separated claims)
    fn state(entries: &[(&str, i64, &str)], edges: &[(&str, &str)]) -> PolicyResolution {
        let mut state = PolicyResolution::new();
        for (component, version, claims) in entries {
            let mut instance = if *component == "root" {
                ComponentInstance::service(key(component), "kubernetes")
            } else {
                let mut params = orchard_lang::ParameterTree::new();
                params.insert("version".to_string(), json!(version));
                ComponentInstance::code(key(component), "kubernetes", "helm", params)
            };
            instance.claim_keys = claims
                .split(',')
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            state.record(instance).unwrap();
        }
        for (from, to) in edges {
            state.store_edge(&key(from), &key(to));
        }
        state
    }

    fn names(plan: &ActionPlan) -> Vec<String> {
        plan.actions()
            .map(|a| format!("{} {}", a.name(), a.key().component))
            .collect()
    }

    #[test]
    fn test_diff_of_identical_states_is_empty() {
        let s = state(&[("root", 0, "c1"), ("a", 1, "c1")], &[("root", "a")]);
        assert!(diff(&s, &s).is_empty());
    }

    #[test]
    fn test_create_from_empty() {
        let desired = state(
            &[("root", 0, "c1"), ("a", 1, "c1"), ("b", 1, "c1")],
            &[("root", "a"), ("root", "b"), ("b", "a")],
        );
        let plan = diff(&desired, &PolicyResolution::new());
        assert_eq!(
            names(&plan),
            vec![
                "create a", "attach a", "endpoints a",
                "create b", "attach b", "endpoints b",
                "create root", "attach root",
            ]
        );
        let b = plan.step(&key("b")).unwrap();
        assert_eq!(b.after, BTreeSet::from([key("a")]));
    }

    #[test]
    fn test_update_also_updates_parent_bundle() {
        let actual = state(&[("root", 0, "c1"), ("a", 1, "c1")], &[("root", "a")]);
        let desired = state(&[("root", 0, "c1"), ("a", 2, "c1")], &[("root", "a")]);
        let plan = diff(&desired, &actual);
        assert_eq!(names(&plan), vec!["update a", "endpoints a", "update root"]);
    }

    #[test]
    fn test_delete_in_reverse_order_with_detach_first() {
        let actual = state(
            &[("root", 0, "c1"), ("a", 1, "c1"), ("b", 1, "c1")],
            &[("root", "a"), ("root", "b"), ("b", "a")],
        );
        let plan = diff(&PolicyResolution::new(), &actual);
        assert_eq!(
            names(&plan),
            vec![
                "detach root", "delete root",
                "detach b", "delete b",
                "detach a", "delete a",
            ]
        );
        let a = plan.step(&key("a")).unwrap();
        assert_eq!(a.after, BTreeSet::from([key("b"), key("root")]));
    }

    #[test]
    fn test_attach_and_detach_claims() {
        let actual = state(&[("a", 1, "c1,c2")], &[]);
        let desired = state(&[("a", 1, "c2,c3")], &[]);
        let plan = diff(&desired, &actual);
        let rendered: Vec<String> = plan.actions().map(|a| a.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                format!("detach c1 from {}", key("a")),
                format!("attach c3 to {}", key("a")),
            ]
        );
    }

    #[test]
    fn test_stale_endpoints_are_refreshed() {
        let desired = state(&[("root", 0, "c1"), ("a", 1, "c1")], &[("root", "a")]);
        let mut actual = desired.clone();
        actual.instance_mut(&key("a")).unwrap().endpoints_stale = true;
        assert_eq!(names(&diff(&desired, &actual)), vec!["endpoints a"]);
        assert!(diff(&actual, &desired).is_empty());
    }

    #[test]
    fn test_instance_without_claims_is_recreated() {
        let actual = state(&[("a", 1, "")], &[]);
        let desired = state(&[("a", 1, "c1")], &[]);
        assert_eq!(names(&diff(&desired, &actual)), vec!["create a", "attach a", "endpoints a"]);
    }
}
