//! Plugins that don't touch any cluster

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use super::plugin::{DeployPlugin, PluginParams, Resources};
use crate::error::{Error, Result};

/// Accepts every operation, optionally sleeping first
#[derive(Debug, Clone, Default)]
pub struct NoopPlugin {
    sleep: Duration,
}

impl NoopPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sleep(sleep: Duration) -> Self {
        Self { sleep }
    }

    async fn pause(&self) {
        if !self.sleep.is_zero() {
            tokio::time::sleep(self.sleep).await;
        }
    }
}

#[async_trait]
impl DeployPlugin for NoopPlugin {
    fn name(&self) -> &str {
        "noop"
    }

    async fn create(&self, params: &PluginParams) -> Result<()> {
        self.pause().await;
        tracing::debug!(name = %params.deploy_name, "noop create");
        Ok(())
    }

    async fn update(&self, params: &PluginParams) -> Result<()> {
        self.pause().await;
        tracing::debug!(name = %params.deploy_name, "noop update");
        Ok(())
    }

    async fn destroy(&self, params: &PluginParams) -> Result<()> {
        self.pause().await;
        tracing::debug!(name = %params.deploy_name, "noop destroy");
        Ok(())
    }

    async fn endpoints(&self, params: &PluginParams) -> Result<BTreeMap<String, String>> {
        self.pause().await;
        Ok(BTreeMap::from([(
            "http".to_string(),
            format!("http://{}.local", params.deploy_name),
        )]))
    }

    async fn status(&self, _params: &PluginParams) -> Result<bool> {
        Ok(true)
    }

    async fn resources(&self, params: &PluginParams) -> Result<Resources> {
        let mut resources = Resources::default();
        resources.add(params.code_type.clone(), params.deploy_name.clone());
        Ok(resources)
    }
}

/// How [`FailingPlugin`] fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    Error,
    Panic,
}

/// Fails every operation on instances whose key contains a substring,
/// behaves like [`NoopPlugin`] for the rest
#[derive(Debug, Clone)]
pub struct FailingPlugin {
    pattern: String,
    mode: FailureMode,
}

impl FailingPlugin {
    pub fn error(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: FailureMode::Error,
        }
    }

    pub fn panic(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: FailureMode::Panic,
        }
    }

    fn check(&self, params: &PluginParams, op: &str) -> Result<()> {
        let key = params.key.to_string();
        if !key.contains(&self.pattern) {
            return Ok(());
        }
        match self.mode {
            FailureMode::Error => Err(Error::plugin(
                &key,
                format!("{} failed: key matches '{}'", op, self.pattern),
            )),
            FailureMode::Panic => panic!("{} panicked: key '{}' matches '{}'", op, key, self.pattern),
        }
    }
}

#[async_trait]
impl DeployPlugin for FailingPlugin {
    fn name(&self) -> &str {
        "fail"
    }

    async fn create(&self, params: &PluginParams) -> Result<()> {
        self.check(params, "create")
    }

    async fn update(&self, params: &PluginParams) -> Result<()> {
        self.check(params, "update")
    }

    async fn destroy(&self, params: &PluginParams) -> Result<()> {
        self.check(params, "destroy")
    }

    async fn endpoints(&self, params: &PluginParams) -> Result<BTreeMap<String, String>> {
        self.check(params, "endpoints")?;
        Ok(BTreeMap::new())
    }

    async fn status(&self, params: &PluginParams) -> Result<bool> {
        Ok(!params.key.to_string().contains(&self.pattern))
    }

    async fn resources(&self, params: &PluginParams) -> Result<Resources> {
        self.check(params, "resources")?;
        Ok(Resources::default())
    }
}
