//! Error types for orchard-core

use std::path::PathBuf;

/// Result type for orchard-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by configuration, storage and the reconciliation loop
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Persistence failure
    #[error("store error: {message}")]
    Store { message: String },

    /// No policy generation stored yet, or the requested one doesn't exist
    #[error("policy generation {generation} not found")]
    PolicyNotFound { generation: u64 },

    /// Claim isn't part of the stored policy
    #[error("claim '{claim}' not found")]
    ClaimNotFound { claim: String },

    /// Requested revision doesn't exist
    #[error("revision not found: {selector}")]
    RevisionNotFound { selector: String },

    /// User named on the command line or in the configuration doesn't exist
    #[error("unknown user '{name}'")]
    UnknownUser { name: String },

    /// A configuration layer failed to parse
    #[error("invalid configuration in {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The merged configuration doesn't match the schema
    #[error("invalid configuration: {0}")]
    ConfigInvalid(#[source] toml::de::Error),

    /// Policy language error (validation, ACL, codec)
    #[error(transparent)]
    Lang(#[from] orchard_lang::Error),

    /// Resolution, diff or apply error
    #[error(transparent)]
    Engine(#[from] orchard_engine::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}
