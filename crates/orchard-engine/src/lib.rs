//! Resolution, diff and apply engines for orchard
//!
//! One reconciliation cycle flows through three stages:
//!
//! - **Resolve**: expand every claim of a policy into component instances
//!   and the dependency edges between them (the desired state)
//! - **Diff**: compare the desired state with the actual one and produce an
//!   ordered action plan
//! - **Apply**: run the plan through deployment plugins with bounded
//!   concurrency, producing the next actual state
//!
//! # Architecture
//!
//! ```text
//!   Policy + users
//!        |
//!     resolve  ----> PolicyResolution (desired)
//!                          |
//!   PolicyResolution ---> diff ---> ActionPlan
//!      (actual)                         |
//!                                     apply ----> plugins
//!                                       |
//!                             PolicyResolution (new actual)
//! ```
//!
//! Each stage writes an [`EventLog`] instead of stopping at the first
//! problem.

pub mod apply;
pub mod diff;
pub mod error;
pub mod event;
pub mod resolve;

pub use apply::{
    ApplyEngine, ApplyResult, DeployPlugin, FailingPlugin, NoopPlugin, PluginParams,
    PluginRegistry, Progress, ProgressIndicator, ProgressSnapshot, Resources, StepOutcome,
    TallySnapshot,
};
pub use diff::{Action, ActionPlan, PlanStep, diff, render};
pub use error::{Error, Result};
pub use event::{Event, EventLog, Level};
pub use resolve::{
    ClaimResolution, ComponentInstance, ComponentInstanceKey, PolicyResolution, Resolution,
    ResolutionContext, Resolver, resolve,
};
