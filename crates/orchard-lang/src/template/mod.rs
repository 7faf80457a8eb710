//! Parameter templates
//!
//! A small text-template language used for code parameters, discovery values
//! and allocation keys. Text is copied verbatim; `{{ ... }}` actions are
//! evaluated against a JSON data tree:
//!
//! - `{{ .User.Labels.team }}` walks the data tree
//! - `{{ default "x" .Labels.tier }}` returns the fallback when the value is
//!   missing, an empty string/list/map, or `false`
//! - `{{ default .Labels.tier }}` returns the value, or an empty string when
//!   missing
//! - `{{ .Labels.tier | default "x" }}` pipes a value into the last argument
//! - `{{-` and `-}}` trim surrounding whitespace
//!
//! Rendering a missing value produces the `<no value>` marker, and any result
//! containing that marker is rejected.

mod cache;
mod parser;

use serde_json::Value;

pub use cache::TemplateCache;

use crate::error::{Error, Result};
use parser::{Arg, Command, Function, Segment};

/// Marker produced when a template renders a reference to an undefined field
pub const NO_VALUE: &str = "<no value>";

/// Data a template is evaluated against
#[derive(Debug, Clone, Default)]
pub struct TemplateParams {
    data: Value,
}

impl TemplateParams {
    /// Wrap a JSON data tree
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// The underlying data tree
    pub fn data(&self) -> &Value {
        &self.data
    }

    fn lookup(&self, path: &[String]) -> Value {
        let mut current = &self.data;
        for segment in path {
            match current.as_object().and_then(|m| m.get(segment)) {
                Some(next) => current = next,
                None => return Value::Null,
            }
        }
        current.clone()
    }
}

/// A compiled template
#[derive(Debug)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Compile a template string
    pub fn compile(source: &str) -> Result<Self> {
        let segments = parser::parse(source).map_err(|reason| Error::TemplateCompile {
            template: source.to_string(),
            reason,
        })?;
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The original template text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render the template
    pub fn evaluate(&self, params: &TemplateParams) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Pipeline(commands) => {
                    let value = self.run_pipeline(commands, params)?;
                    render(&value, &mut out);
                }
            }
        }
        if out.contains(NO_VALUE) {
            return Err(self.eval_error(NO_VALUE));
        }
        Ok(out)
    }

    fn run_pipeline(&self, commands: &[Command], params: &TemplateParams) -> Result<Value> {
        let mut piped: Option<Value> = None;
        for command in commands {
            let value = match command {
                Command::Value(arg) => resolve(arg, params),
                Command::Call { function, args } => {
                    let mut values: Vec<Value> = args.iter().map(|a| resolve(a, params)).collect();
                    if let Some(previous) = piped.take() {
                        values.push(previous);
                    }
                    self.call(*function, values)?
                }
            };
            piped = Some(value);
        }
        Ok(piped.unwrap_or(Value::Null))
    }

    fn call(&self, function: Function, mut args: Vec<Value>) -> Result<Value> {
        match function {
            Function::Default => match args.len() {
                1 => Ok(match args.remove(0) {
                    Value::Null => Value::String(String::new()),
                    value => value,
                }),
                2 => {
                    let value = args.remove(1);
                    let fallback = args.remove(0);
                    Ok(if is_empty(&value) { fallback } else { value })
                }
                n => Err(self.eval_error(&format!(
                    "wrong number of args for default: want 1 or 2 got {}",
                    n
                ))),
            },
        }
    }

    fn eval_error(&self, reason: &str) -> Error {
        Error::TemplateEval {
            template: self.source.clone(),
            reason: reason.to_string(),
        }
    }
}

fn resolve(arg: &Arg, params: &TemplateParams) -> Value {
    match arg {
        Arg::Field(path) => params.lookup(path),
        Arg::Str(s) => Value::String(s.clone()),
        Arg::Number(n) => Value::Number(n.clone()),
        Arg::Bool(b) => Value::Bool(*b),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(m) => m.is_empty(),
        Value::Bool(b) => !b,
        Value::Number(_) => false,
    }
}

fn render(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str(NO_VALUE),
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                render(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push_str("map[");
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(k);
                out.push(':');
                render(v, out);
            }
            out.push(']');
        }
    }
}
