//! Nested parameter trees (code params, discovery, cluster config)

use serde_json::Value;

use crate::error::Result;
use crate::template::{Template, TemplateCache, TemplateParams};

/// A nested map of parameters. String leaves are templates.
pub type ParameterTree = serde_json::Map<String, Value>;

/// Evaluate every string leaf of the tree as a template.
///
/// Maps and lists are walked recursively; numbers, booleans and nulls are
/// copied as they are.
pub fn process_parameter_tree(
    tree: &ParameterTree,
    params: &TemplateParams,
    cache: &TemplateCache,
) -> Result<ParameterTree> {
    let mut result = ParameterTree::new();
    for (key, value) in tree {
        result.insert(key.clone(), process_value(value, params, cache)?);
    }
    Ok(result)
}

fn process_value(value: &Value, params: &TemplateParams, cache: &TemplateCache) -> Result<Value> {
    Ok(match value {
        Value::String(source) => Value::String(cache.evaluate(source, params)?),
        Value::Object(map) => Value::Object(process_parameter_tree(map, params, cache)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| process_value(item, params, cache))
                .collect::<Result<Vec<_>>>()?,
        ),
        other => other.clone(),
    })
}

/// Compile every string leaf without evaluating it
pub fn compile_parameter_tree(tree: &ParameterTree) -> Result<()> {
    for value in tree.values() {
        compile_value(value)?;
    }
    Ok(())
}

fn compile_value(value: &Value) -> Result<()> {
    match value {
        Value::String(source) => Template::compile(source).map(|_| ()),
        Value::Object(map) => compile_parameter_tree(map),
        Value::Array(items) => items.iter().try_for_each(compile_value),
        _ => Ok(()),
    }
}

/// Get (creating if needed) the nested map stored under `key`
pub fn nested_map<'a>(tree: &'a mut ParameterTree, key: &str) -> &'a mut ParameterTree {
    let slot = tree
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(ParameterTree::new()));
    if !slot.is_object() {
        *slot = Value::Object(ParameterTree::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just replaced with an object"),
    }
}
