//! Diff engine.
//!
//! [`diff`] compares a desired [`PolicyResolution`](crate::resolve::PolicyResolution)
//! with the actual one and produces an [`ActionPlan`]: creates and updates in
//! dependency order, deletes in reverse dependency order, claim attach and
//! detach per instance. Diffing a snapshot against itself yields an empty
//! plan.

mod action;
mod plan;
mod text;

pub use action::Action;
pub use plan::{ActionPlan, PlanStep, diff};
pub use text::render;
