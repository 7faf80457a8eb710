//! Criteria: require-all / require-none / require-any expression lists

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expression::{Expression, ExpressionCache, Params};

/// A set of expression lists that together decide whether something matches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Criteria {
    /// Every expression must be true
    #[serde(default, rename = "require-all", skip_serializing_if = "Vec::is_empty")]
    pub require_all: Vec<String>,

    /// At least one expression must be true (ignored when empty)
    #[serde(default, rename = "require-any", skip_serializing_if = "Vec::is_empty")]
    pub require_any: Vec<String>,

    /// No expression may be true
    #[serde(default, rename = "require-none", skip_serializing_if = "Vec::is_empty")]
    pub require_none: Vec<String>,
}

impl Criteria {
    /// Criteria with a single require-all expression
    pub fn all(expressions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            require_all: expressions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Evaluate the criteria.
    ///
    /// Checked in the order all, none, any. The first expression that fails to
    /// evaluate aborts the whole criteria.
    pub fn matches(&self, params: &Params, cache: &ExpressionCache) -> Result<bool> {
        for expr in &self.require_all {
            let ok = cache
                .evaluate_as_bool(expr, params)
                .map_err(|e| Error::criteria("require-all", e))?;
            if !ok {
                return Ok(false);
            }
        }

        for expr in &self.require_none {
            let hit = cache
                .evaluate_as_bool(expr, params)
                .map_err(|e| Error::criteria("require-none", e))?;
            if hit {
                return Ok(false);
            }
        }

        if self.require_any.is_empty() {
            return Ok(true);
        }
        for expr in &self.require_any {
            let hit = cache
                .evaluate_as_bool(expr, params)
                .map_err(|e| Error::criteria("require-any", e))?;
            if hit {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Compile every expression, returning the first failure
    pub fn compile(&self) -> Result<()> {
        self.require_all
            .iter()
            .chain(&self.require_any)
            .chain(&self.require_none)
            .try_for_each(|e| Expression::compile(e).map(|_| ()))
    }
}

/// Evaluate optional criteria; absent criteria always match
pub fn matches(criteria: Option<&Criteria>, params: &Params, cache: &ExpressionCache) -> Result<bool> {
    match criteria {
        None => Ok(true),
        Some(c) => c.matches(params, cache),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::BTreeMap;

    fn params() -> Params {
        Params::from_labels(&BTreeMap::from([
            ("env".to_string(), "prod".to_string()),
            ("priority".to_string(), "50".to_string()),
        ]))
    }

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case(&[], &[], &[], true)]
    #[case(&["env == 'prod'"], &[], &[], true)]
    #[case(&["env == 'prod'", "priority > 100"], &[], &[], false)]
    #[case(&[], &["priority > 100", "env == 'prod'"], &[], true)]
    #[case(&[], &["priority > 100", "env == 'dev'"], &[], false)]
    #[case(&["env == 'prod'"], &[], &["priority < 60"], false)]
    #[case(&["env == 'prod'"], &["missing == 1"], &["priority > 60"], false)]
    #[case(&["env == 'prod'"], &["missing == 1", "true"], &["priority > 60"], true)]
    fn test_criteria_semantics(
        #[case] all: &[&str],
        #[case] any: &[&str],
        #[case] none: &[&str],
        #[case] expected: bool,
    ) {
        let criteria = Criteria {
            require_all: list(all),
            require_any: list(any),
            require_none: list(none),
        };
        assert_eq!(
            criteria.matches(&params(), &ExpressionCache::new()).unwrap(),
            expected
        );
    }

    #[test]
    fn test_absent_criteria_match() {
        assert!(matches(None, &params(), &ExpressionCache::new()).unwrap());
    }

    #[test]
    fn test_first_failing_clause_aborts_with_clause_name() {
        let criteria = Criteria {
            require_all: list(&["env == 'prod'"]),
            require_none: list(&["env + 1"]),
            require_any: list(&["(broken"]),
        };
        let err = criteria
            .matches(&params(), &ExpressionCache::new())
            .unwrap_err();
        assert!(err.to_string().contains("require-none"), "got: {}", err);
    }

    #[test]
    fn test_require_all_short_circuits_before_broken_sibling() {
        let criteria = Criteria::all(["env == 'dev'", "(broken"]);
        assert!(!criteria.matches(&params(), &ExpressionCache::new()).unwrap());
    }
}
