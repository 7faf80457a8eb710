//! Caches shared by resolution passes

use orchard_lang::{ExpressionCache, TemplateCache};

/// Compiled expression and template caches.
///
/// Passed into the resolver instead of living in globals; one context can be
/// shared by concurrent resolutions and reused across reconciliation cycles.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    pub expressions: ExpressionCache,
    pub templates: TemplateCache,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }
}
