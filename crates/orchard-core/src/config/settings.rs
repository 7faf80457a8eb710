//! Configuration schema

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Effective configuration after merging every layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchardConfig {
    pub enforcer: EnforcerConfig,
    pub policy: PolicyConfig,
    pub users: UsersConfig,
    pub state: StateConfig,
}

/// Reconciliation loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcerConfig {
    /// Seconds between reconciliation cycles
    pub interval_secs: u64,
    /// Apply worker pool size
    pub max_concurrent_actions: usize,
    /// Deploy everything with the no-op plugin
    pub noop: bool,
    pub noop_sleep_ms: u64,
    pub disabled: bool,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            max_concurrent_actions: orchard_engine::apply::DEFAULT_MAX_CONCURRENT_ACTIONS,
            noop: false,
            noop_sleep_ms: 0,
            disabled: false,
        }
    }
}

impl EnforcerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn noop_sleep(&self) -> Duration {
        Duration::from_millis(self.noop_sleep_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Directory of policy files, relative to the workspace root
    pub dir: PathBuf,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("policy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersConfig {
    /// YAML list of users, relative to the workspace root
    pub file: PathBuf,
    /// Users with full privileges regardless of ACL rules
    pub domain_admins: Vec<String>,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("users.yaml"),
            domain_admins: vec!["root".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Store snapshot, relative to the workspace root
    pub file: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(".orchard/state.json"),
        }
    }
}

impl OrchardConfig {
    /// Make the relative paths absolute against `root`
    pub fn with_root(mut self, root: &Path) -> Self {
        self.policy.dir = root.join(&self.policy.dir);
        self.users.file = root.join(&self.users.file);
        self.state.file = root.join(&self.state.file);
        self
    }
}
