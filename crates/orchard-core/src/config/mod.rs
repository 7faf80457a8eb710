//! Layered TOML configuration
//!
//! Configuration is loaded and merged from these sources (later sources
//! override earlier, tables are merged key by key):
//!
//! 1. **Global defaults**: `<config_dir>/orchard/config.toml`
//! 2. **Workspace config**: `orchard.toml`
//! 3. **Local overrides**: `orchard.local.toml`
//!
//! # Example
//!
//! ```toml
//! [enforcer]
//! interval_secs = 60
//! max_concurrent_actions = 8
//! noop = true
//!
//! [users]
//! domain_admins = ["root"]
//! ```

mod resolver;
mod settings;

pub use resolver::{CONFIG_FILE, ConfigResolver, LOCAL_CONFIG_FILE};
pub use settings::{EnforcerConfig, OrchardConfig, PolicyConfig, StateConfig, UsersConfig};
