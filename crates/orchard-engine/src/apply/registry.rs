//! Plugin lookup by cluster type and code type

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::mock::NoopPlugin;
use super::plugin::DeployPlugin;
use crate::error::{Error, Result};

/// Matches any cluster type or code type
pub const ANY_TYPE: &str = "*";

/// Registered plugins keyed by `(cluster type, code type)`.
///
/// Lookup tries the exact pair first, then the pair with the code type
/// wildcarded, then the cluster type wildcarded, then `("*", "*")`.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<(String, String), Arc<dyn DeployPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry answering every lookup with the no-op plugin
    pub fn noop(sleep: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(ANY_TYPE, ANY_TYPE, Arc::new(NoopPlugin::with_sleep(sleep)));
        registry
    }

    /// Register a plugin, replacing any previous one for the pair
    pub fn register(
        &mut self,
        cluster_type: impl Into<String>,
        code_type: impl Into<String>,
        plugin: Arc<dyn DeployPlugin>,
    ) {
        let pair = (cluster_type.into(), code_type.into());
        tracing::debug!(cluster_type = %pair.0, code_type = %pair.1, plugin = plugin.name(), "Registering plugin");
        self.plugins.insert(pair, plugin);
    }

    pub fn get(&self, cluster_type: &str, code_type: &str) -> Result<Arc<dyn DeployPlugin>> {
        let candidates = [
            (cluster_type, code_type),
            (cluster_type, ANY_TYPE),
            (ANY_TYPE, code_type),
            (ANY_TYPE, ANY_TYPE),
        ];
        candidates
            .iter()
            .find_map(|(cluster, code)| {
                self.plugins
                    .get(&(cluster.to_string(), code.to_string()))
                    .cloned()
            })
            .ok_or_else(|| Error::PluginNotFound {
                cluster_type: cluster_type.to_string(),
                code_type: code_type.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.plugins
                    .iter()
                    .map(|((cluster, code), plugin)| (format!("{}/{}", cluster, code), plugin.name())),
            )
            .finish()
    }
}
