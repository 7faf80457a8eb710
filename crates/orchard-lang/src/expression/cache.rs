//! Concurrent cache of compiled expressions

use std::sync::Arc;

use dashmap::DashMap;

use super::{Expression, Params};
use crate::error::Result;

/// Cache of compiled expressions keyed by their source text.
///
/// Safe to share between threads. Two callers racing to compile the same
/// expression both succeed and the later insert wins; the compiled forms are
/// interchangeable.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    compiled: DashMap<String, Arc<Expression>>,
}

impl ExpressionCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the compiled expression, compiling and caching it on first use
    pub fn get(&self, source: &str) -> Result<Arc<Expression>> {
        if let Some(found) = self.compiled.get(source) {
            return Ok(Arc::clone(found.value()));
        }
        let expression = Arc::new(Expression::compile(source)?);
        self.compiled
            .insert(source.to_string(), Arc::clone(&expression));
        Ok(expression)
    }

    /// Compile (or reuse) and evaluate an expression as a boolean
    pub fn evaluate_as_bool(&self, source: &str, params: &Params) -> Result<bool> {
        self.get(source)?.evaluate_as_bool(params)
    }

    /// Number of cached expressions
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}
