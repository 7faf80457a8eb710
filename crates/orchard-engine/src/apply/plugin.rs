//! Deployment plugin interface

use std::collections::BTreeMap;

use async_trait::async_trait;
use orchard_lang::ParameterTree;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::resolve::{ComponentInstance, ComponentInstanceKey};

/// Everything a plugin gets to act on one instance
#[derive(Debug, Clone, PartialEq)]
pub struct PluginParams {
    pub key: ComponentInstanceKey,
    /// Stable name derived from the key
    pub deploy_name: String,
    pub cluster_type: String,
    pub code_type: String,
    pub params: ParameterTree,
    pub plugin_data: BTreeMap<String, String>,
}

impl PluginParams {
    pub fn from_instance(instance: &ComponentInstance) -> Self {
        Self {
            key: instance.key.clone(),
            deploy_name: instance.deploy_name(),
            cluster_type: instance.cluster_type.clone(),
            code_type: instance.code_type.clone(),
            params: instance.code_params.clone(),
            plugin_data: instance.plugin_data.clone(),
        }
    }
}

/// Cluster resources backing a deployed instance, grouped by resource kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub items: BTreeMap<String, Vec<String>>,
}

impl Resources {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&mut self, kind: impl Into<String>, name: impl Into<String>) {
        self.items.entry(kind.into()).or_default().push(name.into());
    }
}

/// Backend that deploys code instances onto a type of cluster.
///
/// All operations are keyed by the deploy name in [`PluginParams`] and must
/// be safe to retry.
#[async_trait]
pub trait DeployPlugin: Send + Sync {
    fn name(&self) -> &str;

    async fn create(&self, params: &PluginParams) -> Result<()>;

    async fn update(&self, params: &PluginParams) -> Result<()>;

    async fn destroy(&self, params: &PluginParams) -> Result<()>;

    /// Endpoints published by the deployed instance, name to URL
    async fn endpoints(&self, params: &PluginParams) -> Result<BTreeMap<String, String>>;

    /// Whether the deployed instance is ready
    async fn status(&self, params: &PluginParams) -> Result<bool>;

    async fn resources(&self, params: &PluginParams) -> Result<Resources>;
}
