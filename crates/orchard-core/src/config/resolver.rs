//! Layered configuration loading
//!
//! The `ConfigResolver` reads every TOML layer that exists and deep merges
//! them, later layers overriding earlier ones.

use std::fs;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

use super::settings::OrchardConfig;
use crate::error::{Error, Result};

/// Workspace configuration file
pub const CONFIG_FILE: &str = "orchard.toml";

/// Uncommitted local overrides
pub const LOCAL_CONFIG_FILE: &str = "orchard.local.toml";

/// Resolves configuration by merging, in order:
/// 1. Global defaults (`<config_dir>/orchard/config.toml`)
/// 2. Workspace config (`orchard.toml`)
/// 3. Local overrides (`orchard.local.toml`)
pub struct ConfigResolver {
    root: PathBuf,

    /// Replaces `dirs::config_dir()` in tests
    global_config_dir_override: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            global_config_dir_override: None,
        }
    }

    /// Create a resolver with a custom global config directory
    pub fn with_global_config_dir(root: impl Into<PathBuf>, global_config_dir: PathBuf) -> Self {
        Self {
            root: root.into(),
            global_config_dir_override: Some(global_config_dir),
        }
    }

    fn global_config_dir(&self) -> Option<PathBuf> {
        if let Some(ref override_dir) = self.global_config_dir_override {
            return Some(override_dir.clone());
        }
        dirs::config_dir().map(|d| d.join("orchard"))
    }

    /// Paths of every layer, lowest precedence first
    pub fn layers(&self) -> Vec<PathBuf> {
        let mut layers = Vec::new();
        if let Some(global_dir) = self.global_config_dir() {
            layers.push(global_dir.join("config.toml"));
        }
        layers.push(self.root.join(CONFIG_FILE));
        layers.push(self.root.join(LOCAL_CONFIG_FILE));
        layers
    }

    /// Merge all layers into the effective configuration.
    ///
    /// Missing layers are skipped. Relative paths in the result are resolved
    /// against the workspace root.
    pub fn resolve(&self) -> Result<OrchardConfig> {
        let mut merged = Table::new();
        for path in self.layers() {
            if !path.is_file() {
                tracing::debug!(?path, "No config layer, skipping");
                continue;
            }
            tracing::debug!(?path, "Loading config layer");
            let layer = load_layer(&path)?;
            deep_merge(&mut merged, layer);
        }

        let config: OrchardConfig = Value::Table(merged)
            .try_into()
            .map_err(Error::ConfigInvalid)?;
        Ok(config.with_root(&self.root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has_config(&self) -> bool {
        self.root.join(CONFIG_FILE).is_file()
    }
}

fn load_layer(path: &Path) -> Result<Table> {
    let content = fs::read_to_string(path)?;
    toml::from_str::<Table>(&content).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge `other` into `base`; tables merge key by key, anything else is
/// replaced
fn deep_merge(base: &mut Table, other: Table) {
    for (key, other_val) in other {
        match (base.get_mut(&key), other_val) {
            (Some(Value::Table(base_table)), Value::Table(other_table)) => {
                deep_merge(base_table, other_table);
            }
            (_, other_val) => {
                base.insert(key, other_val);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn resolver(root: &TempDir, global: &TempDir) -> ConfigResolver {
        ConfigResolver::with_global_config_dir(root.path(), global.path().to_path_buf())
    }

    #[test]
    fn test_defaults_without_config() {
        let (root, global) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        let config = resolver(&root, &global).resolve().unwrap();

        assert_eq!(config.enforcer.interval_secs, 60);
        assert_eq!(config.enforcer.max_concurrent_actions, 8);
        assert_eq!(config.users.domain_admins, vec!["root".to_string()]);
        assert_eq!(config.policy.dir, root.path().join("policy"));
        assert_eq!(config.state.file, root.path().join(".orchard/state.json"));
    }

    #[test]
    fn test_layers_deep_merge() {
        let (root, global) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        fs::write(
            global.path().join("config.toml"),
            "[enforcer]\ninterval_secs = 5\nmax_concurrent_actions = 2\n",
        )
        .unwrap();
        fs::write(root.path().join(CONFIG_FILE), "[enforcer]\nnoop = true\n").unwrap();
        fs::write(
            root.path().join(LOCAL_CONFIG_FILE),
            "[enforcer]\nmax_concurrent_actions = 4\n[policy]\ndir = \"objects\"\n",
        )
        .unwrap();

        let config = resolver(&root, &global).resolve().unwrap();
        assert_eq!(config.enforcer.interval_secs, 5);
        assert_eq!(config.enforcer.max_concurrent_actions, 4);
        assert!(config.enforcer.noop);
        assert_eq!(config.policy.dir, root.path().join("objects"));
    }

    #[test]
    fn test_invalid_layer_names_the_file() {
        let (root, global) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        fs::write(root.path().join(CONFIG_FILE), "[enforcer\n").unwrap();

        let err = resolver(&root, &global).resolve().unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let (root, global) = (TempDir::new().unwrap(), TempDir::new().unwrap());
        fs::write(root.path().join(CONFIG_FILE), "[enforcer]\ninterval_secs = \"soon\"\n").unwrap();

        let err = resolver(&root, &global).resolve().unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }
}
