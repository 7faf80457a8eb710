//! Shared test fixtures for the orchard workspace.
//!
//! A dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`builder`]: [`PolicyBuilder`] for assembling policies in code
//! - [`scenario`]: ready-made policies, users and policy directories

pub mod builder;
pub mod scenario;

pub use builder::{PolicyBuilder, context, users};
