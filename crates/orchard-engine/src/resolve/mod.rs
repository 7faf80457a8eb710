//! Claim resolution.
//!
//! Each claim is expanded on its own: contract lookup, label transforms and
//! rules, first matching context, allocated bundle, then every component in
//! dependency order. Code components become deployable instances; contract
//! references resolve a nested claim whose bundle the referencing component
//! depends on. Instances are identified by [`ComponentInstanceKey`], so two
//! claims landing on equal keys share one instance.
//!
//! Failures are per claim. A claim that can't be resolved is recorded as
//! unresolved in the resulting [`PolicyResolution`] and logged, and the
//! other claims carry on.

mod context;
mod instance;
mod key;
mod resolution;
mod resolver;

pub use context::ResolutionContext;
pub use instance::{ALLOW_INGRESS, ComponentInstance};
pub use key::{BUNDLE_COMPONENT, ComponentInstanceKey, UNKNOWN_SUFFIX};
pub use resolution::{ClaimResolution, PolicyResolution};
pub use resolver::{Resolution, Resolver, resolve};
