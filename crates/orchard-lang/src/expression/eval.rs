//! Tree-walking evaluator

use std::cmp::Ordering;

use regex::Regex;

use super::Params;
use super::Value;
use super::parser::{BinOp, Node, Pattern};

pub(crate) enum EvalError {
    /// A parameter referenced by the expression is absent
    Missing(String),
    Failed(String),
}

type EvalResult = Result<Value, EvalError>;

fn failed<T>(reason: impl Into<String>) -> Result<T, EvalError> {
    Err(EvalError::Failed(reason.into()))
}

pub(crate) fn evaluate(node: &Node, params: &Params) -> EvalResult {
    match node {
        Node::Literal(v) => Ok(v.clone()),
        Node::Param(path) => params
            .lookup(path)
            .ok_or_else(|| EvalError::Missing(path.join("."))),
        Node::Not(inner) => match evaluate(inner, params)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => failed(format!("operator '!' can't be applied to {}", other.type_name())),
        },
        Node::Neg(inner) => match evaluate(inner, params)? {
            Value::Number(n) => Ok(Value::Number(-n)),
            other => failed(format!("operator '-' can't be applied to {}", other.type_name())),
        },
        Node::Binary(BinOp::And, left, right) => {
            if !as_bool(evaluate(left, params)?, "&&")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(as_bool(evaluate(right, params)?, "&&")?))
        }
        Node::Binary(BinOp::Or, left, right) => {
            if as_bool(evaluate(left, params)?, "||")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(as_bool(evaluate(right, params)?, "||")?))
        }
        Node::Binary(op, left, right) => {
            let l = evaluate(left, params)?;
            let r = evaluate(right, params)?;
            binary(*op, l, r)
        }
        Node::Match {
            subject,
            pattern,
            negated,
        } => {
            let subject = match evaluate(subject, params)? {
                Value::Str(s) => s,
                other => return failed(format!("operator '=~' needs a string, got {}", other.type_name())),
            };
            let matched = match pattern {
                Pattern::Compiled(re) => re.is_match(&subject),
                Pattern::Dynamic(node) => match evaluate(node, params)? {
                    Value::Str(p) => Regex::new(&p)
                        .map_err(|e| EvalError::Failed(format!("invalid regex '{}': {}", p, e)))?
                        .is_match(&subject),
                    other => return failed(format!("regex pattern must be a string, got {}", other.type_name())),
                },
            };
            Ok(Value::Bool(matched != *negated))
        }
        Node::In(args) => {
            let Some((first, candidates)) = args.split_first() else {
                return failed("can't evaluate in() function when zero arguments supplied");
            };
            let needle = evaluate(first, params)?;
            for candidate in candidates {
                if evaluate(candidate, params)? == needle {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
    }
}

fn as_bool(value: Value, op: &str) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => failed(format!("operator '{}' needs booleans, got {}", op, other.type_name())),
    }
}

fn binary(op: BinOp, l: Value, r: Value) -> EvalResult {
    match op {
        BinOp::Eq => Ok(Value::Bool(l == r)),
        BinOp::Ne => Ok(Value::Bool(l != r)),
        BinOp::Gt | BinOp::Ge | BinOp::Lt | BinOp::Le => {
            let ordering = match (&l, &r) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => {
                    return failed(format!(
                        "can't compare {} with {}",
                        l.type_name(),
                        r.type_name()
                    ));
                }
            };
            let Some(ordering) = ordering else {
                return failed("comparison with NaN");
            };
            Ok(Value::Bool(match op {
                BinOp::Gt => ordering == Ordering::Greater,
                BinOp::Ge => ordering != Ordering::Less,
                BinOp::Lt => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            }))
        }
        BinOp::Add => match (&l, &r) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{}{}", l, r))),
            _ => failed(format!("can't add {} and {}", l.type_name(), r.type_name())),
        },
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
            let (Value::Number(a), Value::Number(b)) = (&l, &r) else {
                return failed(format!(
                    "arithmetic needs numbers, got {} and {}",
                    l.type_name(),
                    r.type_name()
                ));
            };
            match op {
                BinOp::Sub => Ok(Value::Number(a - b)),
                BinOp::Mul => Ok(Value::Number(a * b)),
                _ if *b == 0.0 => failed("division by zero"),
                BinOp::Div => Ok(Value::Number(a / b)),
                _ => Ok(Value::Number(a % b)),
            }
        }
        BinOp::And => Ok(Value::Bool(as_bool(l, "&&")? && as_bool(r, "&&")?)),
        BinOp::Or => Ok(Value::Bool(as_bool(l, "||")? || as_bool(r, "||")?)),
    }
}
