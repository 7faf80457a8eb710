//! Orchard Core
//!
//! Configuration, storage and the reconciliation loop.
//!
//! ```text
//!   orchard.toml ──► OrchardConfig ──► Workspace
//!                                        │
//!          policy/*.yaml ──sync_policy──►│ MemoryStore (policy generations,
//!          users.yaml ──FileUserLoader──►│   actual state, revisions)
//!                                        ▼
//!                                    Enforcer
//!                       resolve ─► diff ─► apply ─► Revision
//! ```
//!
//! Every policy change goes through the store, which checks ACLs, validates
//! the result and bumps the policy generation only when objects changed.
//! The [`Enforcer`] turns the latest generation into actions and records
//! each cycle with work to do as a [`Revision`].

pub mod config;
pub mod enforcer;
pub mod error;
pub mod revision;
pub mod status;
pub mod store;
pub mod users;
pub mod workspace;

pub use config::{ConfigResolver, EnforcerConfig, OrchardConfig};
pub use enforcer::{CycleReport, Enforcer, PlanPreview};
pub use error::{Error, Result};
pub use revision::{Revision, RevisionStatus};
pub use status::{ClaimStatus, InstanceResources, RevisionSelector, StatusFlag, revision_status};
pub use store::{
    MemoryStore, ObjectRef, PolicyGeneration, PolicyStore, PolicyUpdate, RevisionStore,
    StateStore, Store, UpdateOutcome,
};
pub use users::FileUserLoader;
pub use workspace::Workspace;
