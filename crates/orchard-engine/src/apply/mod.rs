//! Apply engine.
//!
//! Executes an [`ActionPlan`](crate::diff::ActionPlan) against deployment
//! plugins looked up in a [`PluginRegistry`]. Steps run with bounded
//! concurrency in dependency order; every outcome is counted in a [`Tally`]
//! and reported to a [`ProgressIndicator`].

mod engine;
pub mod mock;
mod plugin;
mod progress;
mod registry;
mod tally;

pub use engine::{ApplyEngine, ApplyResult, DEFAULT_MAX_CONCURRENT_ACTIONS, StepOutcome};
pub use mock::{FailingPlugin, NoopPlugin};
pub use plugin::{DeployPlugin, PluginParams, Resources};
pub use progress::{NoProgress, Progress, ProgressIndicator, ProgressSnapshot};
pub use registry::{ANY_TYPE, PluginRegistry};
pub use tally::{Tally, TallySnapshot};
