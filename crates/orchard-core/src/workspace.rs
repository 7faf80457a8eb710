//! A directory holding configuration, policy files, users and state

use std::path::{Path, PathBuf};
use std::sync::Arc;

use orchard_lang::{Policy, PolicyObject, User, UserLoader, bootstrap_rules, load_dir};

use crate::config::{ConfigResolver, OrchardConfig};
use crate::enforcer::{Enforcer, PlanPreview};
use crate::error::{Error, Result};
use crate::store::{MemoryStore, PolicyStore, PolicyUpdate, UpdateOutcome};
use crate::users::FileUserLoader;

/// Wires the store, the user loader and the enforcer together from an
/// [`OrchardConfig`]
pub struct Workspace {
    config: OrchardConfig,
    store: Arc<MemoryStore>,
    users: Arc<FileUserLoader>,
}

impl Workspace {
    /// Load the layered configuration under `root` and open the store
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let config = ConfigResolver::new(root).resolve()?;
        Self::from_config(config)
    }

    pub fn from_config(config: OrchardConfig) -> Result<Self> {
        let store = MemoryStore::open(&config.state.file)?;
        let users = FileUserLoader::new(&config.users.file, config.users.domain_admins.clone());
        Ok(Self {
            config,
            store: Arc::new(store),
            users: Arc::new(users),
        })
    }

    pub fn config(&self) -> &OrchardConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn policy_dir(&self) -> &Path {
        &self.config.policy.dir
    }

    pub fn user(&self, name: &str) -> Result<User> {
        self.users
            .load_by_name(name)?
            .ok_or_else(|| Error::UnknownUser {
                name: name.to_string(),
            })
    }

    /// Decode every policy file
    pub fn policy_files(&self) -> Result<Vec<PolicyObject>> {
        Ok(load_dir(self.policy_dir())?)
    }

    /// The policy files as a validated policy, bootstrap ACL rules included
    pub fn validate_files(&self) -> Result<Policy> {
        let objects = bootstrap_rules()
            .into_iter()
            .map(PolicyObject::AclRule)
            .chain(self.policy_files()?);
        let policy = Policy::from_objects(objects);
        policy.validate()?;
        Ok(policy)
    }

    /// Resolve the policy files and diff them against the actual state
    /// without storing anything
    pub fn plan_files(&self) -> Result<PlanPreview> {
        let policy = self.validate_files()?;
        let (_, generation) = self.store.policy(None)?;
        self.enforcer().preview_policy(&policy, generation)
    }

    /// Replace the stored policy with the policy files, on behalf of `user`
    pub fn sync_policy(&self, user: &str) -> Result<UpdateOutcome> {
        let user = self.user(user)?;
        let objects = self.policy_files()?;
        let (current, _) = self.store.policy(None)?;
        let outcome = self
            .store
            .update_policy(&user, PolicyUpdate::replace(&current, objects))?;
        tracing::debug!(generation = outcome.generation, changed = outcome.changed, "Policy synced");
        Ok(outcome)
    }

    /// An enforcer over this workspace, with plugins per the configuration
    pub fn enforcer(&self) -> Enforcer {
        let config = self.config.enforcer.clone();
        Enforcer::new(
            self.store.clone(),
            self.users.clone(),
            Enforcer::registry_for(&config),
            config,
        )
    }
}
