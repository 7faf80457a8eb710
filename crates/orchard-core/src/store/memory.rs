//! In-memory store with optional JSON snapshots

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use orchard_engine::PolicyResolution;
use orchard_lang::{Policy, User};
use serde::{Deserialize, Serialize};

use super::{
    PolicyGeneration, PolicyStore, PolicyUpdate, RevisionStore, StateStore, UpdateOutcome,
};
use crate::error::{Error, Result};
use crate::revision::Revision;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    policies: Vec<PolicyGeneration>,
    #[serde(default)]
    actual: PolicyResolution,
    #[serde(default)]
    revisions: Vec<Revision>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            policies: vec![PolicyGeneration::initial()],
            actual: PolicyResolution::new(),
            revisions: Vec::new(),
        }
    }
}

impl Snapshot {
    fn latest(&self) -> Result<&PolicyGeneration> {
        self.policies
            .last()
            .ok_or(Error::PolicyNotFound { generation: 0 })
    }
}

/// Store keeping everything in memory.
///
/// Generations are assigned while holding the lock, so concurrent updates
/// get distinct, increasing numbers. When opened with a path, every change
/// is written to that file as JSON.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Snapshot>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// A store that lives only in memory
    pub fn new() -> Self {
        Self::default()
    }

    /// A store backed by a JSON snapshot file, loaded if it exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = if path.is_file() {
            tracing::debug!(?path, "Loading store snapshot");
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Snapshot::default()
        };
        Ok(Self {
            inner: Mutex::new(snapshot),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Snapshot>> {
        self.inner
            .lock()
            .map_err(|_| Error::store("store lock poisoned"))
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(snapshot)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        tracing::trace!(?path, "Store snapshot written");
        Ok(())
    }
}

impl PolicyStore for MemoryStore {
    fn policy(&self, generation: Option<u64>) -> Result<(Policy, u64)> {
        let inner = self.lock()?;
        let found = match generation {
            None => inner.latest()?,
            Some(generation) => inner
                .policies
                .iter()
                .find(|p| p.generation == generation)
                .ok_or(Error::PolicyNotFound { generation })?,
        };
        Ok((found.policy(), found.generation))
    }

    fn update_policy(&self, user: &User, update: PolicyUpdate) -> Result<UpdateOutcome> {
        let mut inner = self.lock()?;
        let latest = inner.latest()?;
        let generation = latest.generation;
        let mut policy = latest.policy();

        let mut changed = false;
        for object in update.remove {
            let (updated, removed) =
                policy
                    .view(user)
                    .remove_object(object.kind, &object.namespace, &object.name)?;
            policy = updated;
            changed |= removed;
        }
        for object in update.add {
            let (updated, added) = policy.view(user).add_object(object)?;
            policy = updated;
            changed |= added;
        }

        if !changed {
            tracing::debug!(generation, user = %user.name, "Policy update changed nothing");
            return Ok(UpdateOutcome {
                generation,
                changed: false,
            });
        }

        policy.validate()?;
        let next = generation + 1;
        inner.policies.push(PolicyGeneration {
            generation: next,
            objects: policy.objects(),
            author: user.name.clone(),
            created_at: Utc::now(),
        });
        self.persist(&inner)?;
        tracing::info!(generation = next, user = %user.name, "Stored new policy generation");

        Ok(UpdateOutcome {
            generation: next,
            changed: true,
        })
    }
}

impl StateStore for MemoryStore {
    fn actual_state(&self) -> Result<PolicyResolution> {
        Ok(self.lock()?.actual.clone())
    }

    fn save_actual_state(&self, state: &PolicyResolution) -> Result<()> {
        let mut inner = self.lock()?;
        inner.actual = state.clone();
        self.persist(&inner)
    }
}

impl RevisionStore for MemoryStore {
    fn create_revision(&self, policy_generation: u64) -> Result<Revision> {
        let mut inner = self.lock()?;
        let generation = inner.revisions.last().map_or(1, |r| r.generation + 1);
        let revision = Revision::new(generation, policy_generation);
        inner.revisions.push(revision.clone());
        self.persist(&inner)?;
        Ok(revision)
    }

    fn save_revision(&self, revision: &Revision) -> Result<()> {
        let mut inner = self.lock()?;
        let stored = inner
            .revisions
            .iter_mut()
            .find(|r| r.generation == revision.generation)
            .ok_or_else(|| Error::RevisionNotFound {
                selector: format!("generation {}", revision.generation),
            })?;
        *stored = revision.clone();
        self.persist(&inner)
    }

    fn revision(&self, generation: u64) -> Result<Option<Revision>> {
        Ok(self
            .lock()?
            .revisions
            .iter()
            .find(|r| r.generation == generation)
            .cloned())
    }

    fn revisions(&self) -> Result<Vec<Revision>> {
        Ok(self.lock()?.revisions.clone())
    }
}
