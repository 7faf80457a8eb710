//! Storage collaborators.
//!
//! The reconciliation loop only needs three narrow interfaces: policy
//! generations, the actual state, and revisions. [`MemoryStore`] implements
//! all of them in memory, optionally snapshotting to a JSON file after every
//! change.

mod memory;

use chrono::{DateTime, Utc};
use orchard_engine::PolicyResolution;
use orchard_lang::{Kind, Policy, PolicyObject, User, bootstrap_rules};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::revision::Revision;

pub use memory::MemoryStore;

/// One stored version of the policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyGeneration {
    pub generation: u64,
    pub objects: Vec<PolicyObject>,
    /// User who made the change
    pub author: String,
    pub created_at: DateTime<Utc>,
}

impl PolicyGeneration {
    /// The first generation: just the bootstrap ACL rules
    pub fn initial() -> Self {
        Self {
            generation: 1,
            objects: bootstrap_rules()
                .into_iter()
                .map(PolicyObject::AclRule)
                .collect(),
            author: "system".to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn policy(&self) -> Policy {
        Policy::from_objects(self.objects.iter().cloned())
    }
}

/// Names a policy object
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectRef {
    pub kind: Kind,
    pub namespace: String,
    pub name: String,
}

impl ObjectRef {
    pub fn of(object: &PolicyObject) -> Self {
        let meta = object.metadata();
        Self {
            kind: object.kind(),
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
        }
    }
}

/// Objects to add (or replace) and remove in one policy change
#[derive(Debug, Clone, Default)]
pub struct PolicyUpdate {
    pub add: Vec<PolicyObject>,
    pub remove: Vec<ObjectRef>,
}

impl PolicyUpdate {
    pub fn add(objects: Vec<PolicyObject>) -> Self {
        Self {
            add: objects,
            remove: Vec::new(),
        }
    }

    /// Turn `current` into exactly `objects`. Bootstrap ACL rules are never
    /// removed.
    pub fn replace(current: &Policy, objects: Vec<PolicyObject>) -> Self {
        let keep: Vec<ObjectRef> = objects
            .iter()
            .map(ObjectRef::of)
            .chain(
                bootstrap_rules()
                    .into_iter()
                    .map(|r| ObjectRef::of(&PolicyObject::AclRule(r))),
            )
            .collect();
        let remove = current
            .objects()
            .iter()
            .map(ObjectRef::of)
            .filter(|r| !keep.contains(r))
            .collect();
        Self {
            add: objects,
            remove,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Result of a policy update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Current generation after the update
    pub generation: u64,
    /// Whether a new generation was created
    pub changed: bool,
}

/// Versioned policy storage
pub trait PolicyStore: Send + Sync {
    /// A policy generation, the latest when `generation` is `None`
    fn policy(&self, generation: Option<u64>) -> Result<(Policy, u64)>;

    /// Apply an update on behalf of `user`.
    ///
    /// Every change is ACL checked and the result validated. A new generation
    /// is stored only when the object set actually changed.
    fn update_policy(&self, user: &User, update: PolicyUpdate) -> Result<UpdateOutcome>;
}

/// Storage of the actual (deployed) state
pub trait StateStore: Send + Sync {
    fn actual_state(&self) -> Result<PolicyResolution>;

    fn save_actual_state(&self, state: &PolicyResolution) -> Result<()>;
}

/// Storage of revisions
pub trait RevisionStore: Send + Sync {
    /// Create and store a new `Waiting` revision with the next generation
    fn create_revision(&self, policy_generation: u64) -> Result<Revision>;

    /// Replace a stored revision
    fn save_revision(&self, revision: &Revision) -> Result<()>;

    fn revision(&self, generation: u64) -> Result<Option<Revision>>;

    /// All revisions, oldest first
    fn revisions(&self) -> Result<Vec<Revision>>;

    fn last_revision(&self) -> Result<Option<Revision>> {
        Ok(self.revisions()?.pop())
    }
}

/// Everything the enforcer needs
pub trait Store: PolicyStore + StateStore + RevisionStore {}

impl<T: PolicyStore + StateStore + RevisionStore> Store for T {}
