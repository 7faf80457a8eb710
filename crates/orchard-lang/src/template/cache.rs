//! Concurrent cache of compiled templates

use std::sync::Arc;

use dashmap::DashMap;

use super::{Template, TemplateParams};
use crate::error::Result;

/// Cache of compiled templates keyed by their source text
#[derive(Debug, Default)]
pub struct TemplateCache {
    compiled: DashMap<String, Arc<Template>>,
}

impl TemplateCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the compiled template, compiling and caching it on first use
    pub fn get(&self, source: &str) -> Result<Arc<Template>> {
        if let Some(found) = self.compiled.get(source) {
            return Ok(Arc::clone(found.value()));
        }
        let template = Arc::new(Template::compile(source)?);
        self.compiled.insert(source.to_string(), Arc::clone(&template));
        Ok(template)
    }

    /// Compile (or reuse) and render a template
    pub fn evaluate(&self, source: &str, params: &TemplateParams) -> Result<String> {
        self.get(source)?.evaluate(params)
    }

    /// Number of cached templates
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}
