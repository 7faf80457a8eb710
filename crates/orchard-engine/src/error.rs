//! Error types for orchard-engine

/// Result type for orchard-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving, diffing or applying
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Policy language error (lookup, expression, template, ACL)
    #[error(transparent)]
    Lang(#[from] orchard_lang::Error),

    /// Claim failed to resolve
    #[error("claim '{claim}' failed to resolve: {source}")]
    Resolution {
        claim: String,
        #[source]
        source: Box<Error>,
    },

    /// No `target` label to pick a cluster from
    #[error("no '{label}' label to select a cluster")]
    TargetMissing { label: &'static str },

    /// The `target` label could not be parsed
    #[error("invalid target '{target}': expected [namespace/]cluster[.suffix]")]
    InvalidTarget { target: String },

    /// Target cluster doesn't exist
    #[error("cluster '{cluster}' not found in namespace '{namespace}' or the system namespace")]
    ClusterNotFound { cluster: String, namespace: String },

    /// Contract references loop back onto a bundle instance being resolved
    #[error("cross-contract cycle detected: {path}")]
    CrossContractCycle { path: String },

    /// Two claims produced different parameters for one instance
    #[error("conflicting {what} for instance '{key}'")]
    InstanceConflict { key: String, what: &'static str },

    /// No plugin handles the cluster/code type pair
    #[error("no plugin registered for cluster type '{cluster_type}' and code type '{code_type}'")]
    PluginNotFound {
        cluster_type: String,
        code_type: String,
    },

    /// Plugin call failed
    #[error("plugin failed for '{key}': {message}")]
    Plugin { key: String, message: String },

    /// Instance expected in a state snapshot is missing
    #[error("instance '{key}' not found in state")]
    InstanceNotFound { key: String },

    /// Value computed for a key field contains the key separator
    #[error("{field} '{value}' can't be part of an instance key: it contains '#'")]
    InvalidKeyPart { field: &'static str, value: String },

    /// Component uses the name of the bundle-level instance
    #[error("component '{component}' of bundle '{bundle}' uses a reserved name")]
    ReservedComponent { bundle: String, component: String },

    /// Instance key string could not be parsed
    #[error("invalid instance key '{key}'")]
    InvalidKey { key: String },
}

impl Error {
    /// Wrap an error as a per-claim resolution failure
    pub fn resolution(claim: impl Into<String>, source: Error) -> Self {
        Self::Resolution {
            claim: claim.into(),
            source: Box::new(source),
        }
    }

    /// Build a plugin failure
    pub fn plugin(key: impl ToString, message: impl ToString) -> Self {
        Self::Plugin {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}
