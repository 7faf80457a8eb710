//! Contracts and their contexts

use serde::{Deserialize, Serialize};

use crate::criteria::{self, Criteria};
use crate::error::Result;
use crate::expression::{ExpressionCache, Params};
use crate::labels::LabelOperations;
use crate::object::Metadata;

/// A contract offers a list of contexts; the first matching context wins
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Contract {
    pub metadata: Metadata,

    /// Applied to the claim labels before any rule runs
    #[serde(default, skip_serializing_if = "LabelOperations::is_empty")]
    pub change_labels: LabelOperations,

    /// Implementation variants, in declared order
    #[serde(default)]
    pub contexts: Vec<Context>,
}

/// One implementation variant of a contract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Context {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Criteria>,

    /// Applied to the claim labels once this context is chosen
    #[serde(default, skip_serializing_if = "LabelOperations::is_empty")]
    pub change_labels: LabelOperations,

    pub allocation: Allocation,
}

/// Where a context's claims land
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Allocation {
    /// Bundle name, in the contract's namespace
    pub bundle: String,

    /// Templates evaluated per claim to tell instances of this context apart
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

impl Contract {
    /// Return the first context whose criteria match the labels, in declared order
    pub fn find_matching_context(
        &self,
        params: &Params,
        cache: &ExpressionCache,
    ) -> Result<Option<&Context>> {
        for context in &self.contexts {
            if criteria::matches(context.criteria.as_ref(), params, cache)? {
                tracing::debug!(
                    contract = %self.metadata.name,
                    context = %context.name,
                    "context matched"
                );
                return Ok(Some(context));
            }
        }
        Ok(None)
    }

    /// Find a context by name
    pub fn context(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn db_contract() -> Contract {
        Contract {
            metadata: Metadata::new("main", "db"),
            change_labels: LabelOperations::default(),
            contexts: vec![
                Context {
                    name: "a".to_string(),
                    criteria: Some(Criteria::all(["priority >= 100"])),
                    allocation: Allocation {
                        bundle: "db-large".to_string(),
                        keys: vec![],
                    },
                    ..Context::default()
                },
                Context {
                    name: "b".to_string(),
                    allocation: Allocation {
                        bundle: "db-small".to_string(),
                        keys: vec![],
                    },
                    ..Context::default()
                },
            ],
        }
    }

    fn params(priority: &str) -> Params {
        Params::from_labels(&BTreeMap::from([(
            "priority".to_string(),
            priority.to_string(),
        )]))
    }

    #[test]
    fn test_first_matching_context_wins() {
        let contract = db_contract();
        let cache = ExpressionCache::new();

        let low = contract.find_matching_context(&params("50"), &cache).unwrap();
        assert_eq!(low.map(|c| c.name.as_str()), Some("b"));

        // both contexts match, declared order decides
        let high = contract.find_matching_context(&params("150"), &cache).unwrap();
        assert_eq!(high.map(|c| c.name.as_str()), Some("a"));
    }

    #[test]
    fn test_no_context_matches() {
        let mut contract = db_contract();
        contract.contexts.truncate(1);
        let found = contract
            .find_matching_context(&params("1"), &ExpressionCache::new())
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_contract_yaml_shape() {
        let yaml = r#"
metadata: { namespace: main, name: db }
change-labels:
  set: { tier: data }
contexts:
  - name: prod
    criteria:
      require-all: ["env == 'prod'"]
    allocation:
      bundle: postgres
      keys: ["{{ .Labels.team }}"]
"#;
        let contract: Contract = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(contract.contexts[0].allocation.keys.len(), 1);
        assert_eq!(contract.change_labels.set.get("tier").map(String::as_str), Some("data"));
    }
}
