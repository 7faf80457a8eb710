//! Boolean label expressions
//!
//! Expressions are evaluated against a [`Params`] set made of labels and
//! structured objects:
//!
//! - labels are coerced on the way in: integer-like values become numbers,
//!   boolean-like values (`1, t, T, TRUE, true, True, 0, f, F, FALSE, false,
//!   False`) become booleans, everything else stays a string
//! - objects are JSON values reachable through dotted paths (`claim.Labels.team`)
//! - `in(x, v1, v2, ...)` is true when `x` equals one of the candidates
//!
//! A reference to a parameter that doesn't exist makes
//! [`Expression::evaluate_as_bool`] return `false` without an error, since
//! labels are optional. Every other evaluation failure is a hard error.
//!
//! ```
//! use std::collections::BTreeMap;
//! use orchard_lang::expression::{Expression, Params};
//!
//! let labels = BTreeMap::from([("priority".to_string(), "150".to_string())]);
//! let params = Params::from_labels(&labels);
//! let expr = Expression::compile("priority >= 100 && !missing").unwrap();
//! assert!(!expr.evaluate_as_bool(&params).unwrap());
//! ```

mod cache;
mod eval;
mod lexer;
mod parser;

use std::collections::BTreeMap;
use std::fmt;

pub use cache::ExpressionCache;

use crate::error::{Error, Result};
use eval::EvalError;
use parser::Node;

/// A value flowing through expression evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(String),
    /// A non-scalar JSON value (map or list)
    Object(serde_json::Value),
}

impl Value {
    /// Convert a label value using the integer-then-boolean coercion rule
    pub fn from_label(raw: &str) -> Self {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::Number(n as f64);
        }
        match parse_bool(raw) {
            Some(b) => Value::Bool(b),
            None => Value::Str(raw.to_string()),
        }
    }

    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number),
            serde_json::Value::String(s) => Some(Value::Str(s.clone())),
            other => Some(Value::Object(other.clone())),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => f.write_str(s),
            Value::Object(v) => write!(f, "{}", v),
        }
    }
}

/// Parse a boolean the way label values are interpreted
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Parameters an expression is evaluated against
#[derive(Debug, Clone, Default)]
pub struct Params {
    labels: BTreeMap<String, Value>,
    objects: serde_json::Map<String, serde_json::Value>,
}

impl Params {
    /// Build parameters from labels and structured objects
    pub fn new(
        labels: &BTreeMap<String, String>,
        objects: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            labels: labels
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_label(v)))
                .collect(),
            objects,
        }
    }

    /// Build parameters from labels only
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Self {
        Self::new(labels, serde_json::Map::new())
    }

    fn lookup(&self, path: &[String]) -> Option<Value> {
        let (head, rest) = path.split_first()?;
        if rest.is_empty() {
            if let Some(value) = self.labels.get(head) {
                return Some(value.clone());
            }
        }
        let mut current = self.objects.get(head)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Value::from_json(current)
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self
            .labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "labels[{}]", labels.join(", "))?;
        if !self.objects.is_empty() {
            let keys: Vec<&str> = self.objects.keys().map(|k| k.as_str()).collect();
            write!(f, " objects[{}]", keys.join(", "))?;
        }
        Ok(())
    }
}

/// A compiled expression
#[derive(Debug)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Compile an expression string
    pub fn compile(source: &str) -> Result<Self> {
        let tokens = lexer::tokenize(source).map_err(|reason| Error::ExpressionCompile {
            expression: source.to_string(),
            reason,
        })?;
        let root = parser::parse(tokens).map_err(|reason| Error::ExpressionCompile {
            expression: source.to_string(),
            reason,
        })?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// The original expression text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate the expression, requiring a boolean result.
    ///
    /// A missing parameter yields `Ok(false)`.
    pub fn evaluate_as_bool(&self, params: &Params) -> Result<bool> {
        match eval::evaluate(&self.root, params) {
            Ok(Value::Bool(b)) => Ok(b),
            Ok(_) => Err(Error::NotBoolean {
                expression: self.source.clone(),
                params: params.to_string(),
            }),
            Err(EvalError::Missing(name)) => {
                tracing::trace!(expression = %self.source, parameter = %name, "missing parameter, evaluating to false");
                Ok(false)
            }
            Err(EvalError::Failed(reason)) => Err(Error::ExpressionEval {
                expression: self.source.clone(),
                reason,
                params: params.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    enum Outcome {
        True,
        False,
        CompileError,
        EvalError,
    }

    fn params() -> Params {
        let labels = BTreeMap::from([
            ("foo".to_string(), "10".to_string()),
            ("unusedLabel".to_string(), "3".to_string()),
            ("a".to_string(), "valueOfA".to_string()),
            ("bar".to_string(), "true".to_string()),
            ("anotherbar".to_string(), "t".to_string()),
        ]);
        let objects = json!({
            "service": {
                "Name": "myservicename",
                "Labels": { "Name": "Value" }
            }
        });
        let serde_json::Value::Object(objects) = objects else {
            unreachable!()
        };
        Params::new(&labels, objects)
    }

    fn outcome(source: &str) -> Outcome {
        let expr = match Expression::compile(source) {
            Ok(expr) => expr,
            Err(_) => return Outcome::CompileError,
        };
        match expr.evaluate_as_bool(&params()) {
            Ok(true) => Outcome::True,
            Ok(false) => Outcome::False,
            Err(_) => Outcome::EvalError,
        }
    }

    #[rstest]
    #[case("anotherbar == true", Outcome::True)]
    #[case("anotherbar", Outcome::True)]
    #[case("bar == true", Outcome::True)]
    #[case("bar", Outcome::True)]
    #[case("foo > 5", Outcome::True)]
    #[case("a == 'valueOfA'", Outcome::True)]
    #[case("foo > 5 && a == 'valueOfA'", Outcome::True)]
    #[case("anotherbar == 'p'", Outcome::False)]
    #[case("'A' + 'B' == 5", Outcome::False)]
    #[case("in(a, 'valueOfC', 'valueOfB', 'valueOfA')", Outcome::True)]
    #[case("in(foo, 10, 20, 30)", Outcome::True)]
    #[case("in(a, 'valueOfX', 'valueOfY', 'valueOfZ')", Outcome::False)]
    #[case("in(a, )", Outcome::CompileError)]
    #[case("in()", Outcome::EvalError)]
    #[case("in(5)", Outcome::False)]
    #[case("foo > 5 && missingLabel == 'requiredValue'", Outcome::False)]
    #[case("foo > 5 && missingLabel == 239", Outcome::False)]
    #[case("foo == '10'", Outcome::False)]
    #[case("anotherbar == 't'", Outcome::False)]
    #[case("service.Name == 'myservicename'", Outcome::True)]
    #[case("service.Name == 'incorrectservicename'", Outcome::False)]
    #[case("service.Labels.Name + 'B' == 'ValueB'", Outcome::True)]
    #[case("serviceMissing.LabelsMissing.Name + 'B' == 'ValueB'", Outcome::False)]
    #[case("foo + 10 + 'test' > 0", Outcome::EvalError)]
    #[case("'a' + 'b' + bar", Outcome::EvalError)]
    #[case("(5 + 10 > 9", Outcome::CompileError)]
    #[case("a =~ '^value'", Outcome::True)]
    #[case("a !~ 'Of'", Outcome::False)]
    #[case("!(foo < 3) || unknownfn(1)", Outcome::CompileError)]
    #[case("foo * 2 - 5 == 15 && foo % 3 == 1", Outcome::True)]
    fn test_expression_outcomes(#[case] source: &str, #[case] expected: Outcome) {
        assert_eq!(outcome(source), expected, "expression: {}", source);
    }

    #[rstest]
    #[case("42", Value::Number(42.0))]
    #[case("-7", Value::Number(-7.0))]
    #[case("1", Value::Number(1.0))]
    #[case("T", Value::Bool(true))]
    #[case("False", Value::Bool(false))]
    #[case("yes", Value::Str("yes".to_string()))]
    #[case("4.5", Value::Str("4.5".to_string()))]
    fn test_label_coercion(#[case] raw: &str, #[case] expected: Value) {
        assert_eq!(Value::from_label(raw), expected);
    }

    #[test]
    fn test_non_bool_error_carries_expression_and_params() {
        let expr = Expression::compile("foo + 1").unwrap();
        let err = expr.evaluate_as_bool(&params()).unwrap_err();
        let display = err.to_string();
        assert!(display.contains("foo + 1"), "got: {}", display);
        assert!(display.contains("foo=10"), "got: {}", display);
    }
}
