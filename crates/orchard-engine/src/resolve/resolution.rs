//! PolicyResolution: a desired or actual state snapshot

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::instance::ComponentInstance;
use super::key::ComponentInstanceKey;
use crate::error::Result;

/// Resolution outcome of one claim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResolution {
    pub resolved: bool,

    /// Bundle instance the claim landed on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<ComponentInstanceKey>,

    /// Why the claim is unresolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ClaimResolution {
    pub fn resolved(root: ComponentInstanceKey) -> Self {
        Self {
            resolved: true,
            root: Some(root),
            reason: None,
        }
    }

    pub fn unresolved(reason: impl Into<String>) -> Self {
        Self {
            resolved: false,
            root: None,
            reason: Some(reason.into()),
        }
    }
}

/// Map of instance key to instance, the dependency edges between instances,
/// and the per-claim status.
///
/// An edge `a -> b` in `edges_out` means `a` depends on `b`, so `b` must
/// exist first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyResolution {
    pub instances: BTreeMap<ComponentInstanceKey, ComponentInstance>,
    pub edges_out: BTreeMap<ComponentInstanceKey, BTreeSet<ComponentInstanceKey>>,
    pub edges_in: BTreeMap<ComponentInstanceKey, BTreeSet<ComponentInstanceKey>>,
    pub claims: BTreeMap<String, ClaimResolution>,
}

impl PolicyResolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instance(&self, key: &ComponentInstanceKey) -> Option<&ComponentInstance> {
        self.instances.get(key)
    }

    pub fn instance_mut(&mut self, key: &ComponentInstanceKey) -> Option<&mut ComponentInstance> {
        self.instances.get_mut(key)
    }

    /// Record a resolved instance, merging with an existing one under the same key
    pub fn record(&mut self, instance: ComponentInstance) -> Result<()> {
        match self.instances.get_mut(&instance.key) {
            Some(existing) => existing.merge(&instance),
            None => {
                self.instances.insert(instance.key.clone(), instance);
                Ok(())
            }
        }
    }

    /// Record that `from` depends on `to`
    pub fn store_edge(&mut self, from: &ComponentInstanceKey, to: &ComponentInstanceKey) {
        self.edges_out
            .entry(from.clone())
            .or_default()
            .insert(to.clone());
        self.edges_in
            .entry(to.clone())
            .or_default()
            .insert(from.clone());
    }

    /// Keys `key` depends on
    pub fn dependencies(&self, key: &ComponentInstanceKey) -> impl Iterator<Item = &ComponentInstanceKey> {
        self.edges_out.get(key).into_iter().flatten()
    }

    /// Keys depending on `key`
    pub fn dependents(&self, key: &ComponentInstanceKey) -> impl Iterator<Item = &ComponentInstanceKey> {
        self.edges_in.get(key).into_iter().flatten()
    }

    pub fn set_claim(&mut self, claim_key: impl Into<String>, status: ClaimResolution) {
        self.claims.insert(claim_key.into(), status);
    }

    /// Merge another resolution into this one.
    ///
    /// All instances are checked first, so a conflict leaves `self` untouched.
    pub fn merge(&mut self, other: PolicyResolution) -> Result<()> {
        for (key, instance) in &other.instances {
            if let Some(existing) = self.instances.get(key) {
                existing.check_compatible(instance)?;
            }
        }
        for (_, instance) in other.instances {
            self.record(instance)?;
        }
        for (from, targets) in other.edges_out {
            for to in targets {
                self.store_edge(&from, &to);
            }
        }
        self.claims.extend(other.claims);
        Ok(())
    }

    /// Insert a copy of an instance from another snapshot along with its
    /// outgoing edges
    pub fn copy_instance(&mut self, from: &PolicyResolution, instance: ComponentInstance) {
        let key = instance.key.clone();
        self.instances.insert(key.clone(), instance);
        for dep in from.dependencies(&key) {
            self.store_edge(&key, dep);
        }
    }

    /// Remove an instance and every edge touching it
    pub fn remove_instance(&mut self, key: &ComponentInstanceKey) -> Option<ComponentInstance> {
        let removed = self.instances.remove(key)?;
        if let Some(targets) = self.edges_out.remove(key) {
            for to in targets {
                if let Some(sources) = self.edges_in.get_mut(&to) {
                    sources.remove(key);
                    if sources.is_empty() {
                        self.edges_in.remove(&to);
                    }
                }
            }
        }
        if let Some(sources) = self.edges_in.remove(key) {
            for from in sources {
                if let Some(targets) = self.edges_out.get_mut(&from) {
                    targets.remove(key);
                    if targets.is_empty() {
                        self.edges_out.remove(&from);
                    }
                }
            }
        }
        Some(removed)
    }

    /// Every instance key, dependencies before dependents.
    ///
    /// Depth-first over `edges_out`, starting from keys in sorted order, so
    /// the order is deterministic.
    pub fn processing_order(&self) -> Vec<ComponentInstanceKey> {
        let mut visited = BTreeSet::new();
        let mut order = Vec::with_capacity(self.instances.len());
        for key in self.instances.keys() {
            self.visit(key, &mut visited, &mut order);
        }
        order
    }

    fn visit<'a>(
        &'a self,
        key: &'a ComponentInstanceKey,
        visited: &mut BTreeSet<&'a ComponentInstanceKey>,
        order: &mut Vec<ComponentInstanceKey>,
    ) {
        if !visited.insert(key) {
            return;
        }
        for dep in self.dependencies(key) {
            self.visit(dep, visited, order);
        }
        if self.instances.contains_key(key) {
            order.push(key.clone());
        }
    }

    /// Instances referenced by a claim
    pub fn claim_instances(&self, claim_key: &str) -> Vec<&ComponentInstance> {
        self.instances
            .values()
            .filter(|i| i.claim_keys.contains(claim_key))
            .collect()
    }
}
