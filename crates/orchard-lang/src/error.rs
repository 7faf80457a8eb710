//! Error types for orchard-lang

use std::path::PathBuf;

use crate::validation::ValidationIssue;

/// Result type for orchard-lang operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while compiling, evaluating or validating policy
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Expression could not be parsed
    #[error("unable to compile expression '{expression}': {reason}")]
    ExpressionCompile { expression: String, reason: String },

    /// Expression failed at evaluation time
    #[error("unable to evaluate expression '{expression}': {reason} (params: {params})")]
    ExpressionEval {
        expression: String,
        reason: String,
        params: String,
    },

    /// Expression evaluated to something other than a boolean
    #[error("expression '{expression}' didn't evaluate to boolean (params: {params})")]
    NotBoolean { expression: String, params: String },

    /// Template could not be parsed
    #[error("unable to compile template '{template}': {reason}")]
    TemplateCompile { template: String, reason: String },

    /// Template failed at evaluation time
    #[error("unable to evaluate template '{template}': {reason}")]
    TemplateEval { template: String, reason: String },

    /// One clause of a criteria failed to evaluate
    #[error("can't evaluate '{clause}' in criteria: {source}")]
    Criteria {
        clause: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// A rule's criteria failed to evaluate
    #[error("unable to evaluate rule '{rule}': {source}")]
    RuleEvaluation {
        rule: String,
        #[source]
        source: Box<Error>,
    },

    /// Locator has more than two parts
    #[error("can't parse locator '{locator}': expected [namespace/]name")]
    InvalidLocator { locator: String },

    /// Namespace referenced by a locator does not exist
    #[error("namespace '{namespace}' doesn't exist")]
    NamespaceNotFound { namespace: String },

    /// Object referenced by a locator does not exist
    #[error("{kind} '{locator}' not found in namespace '{namespace}'")]
    ObjectNotFound {
        kind: String,
        locator: String,
        namespace: String,
    },

    /// Bundle component dependency points to a component that doesn't exist
    #[error("bundle '{bundle}' has a dependency on non-existing component '{component}'")]
    ComponentNotFound { bundle: String, component: String },

    /// Two components of a bundle share a name
    #[error("bundle '{bundle}' has more than one component named '{component}'")]
    DuplicateComponent { bundle: String, component: String },

    /// Bundle components form a cycle
    #[error("component cycle detected while processing bundle '{bundle}' component '{component}'")]
    ComponentCycle { bundle: String, component: String },

    /// Policy failed validation
    #[error("policy validation failed with {} issue(s): {}", .issues.len(), ValidationIssue::join(.issues))]
    Validation { issues: Vec<ValidationIssue> },

    /// User lacks a privilege on an object
    #[error("user '{user}' doesn't have ACL permissions to {action} {object}")]
    AccessDenied {
        user: String,
        action: &'static str,
        object: String,
    },

    /// Rule set could not be evaluated for a user
    #[error("unable to resolve role for user '{user}': {source}")]
    RoleResolution {
        user: String,
        #[source]
        source: Box<Error>,
    },

    /// Unknown user or wrong password
    #[error("authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Codec met a kind it doesn't know
    #[error("unknown object kind '{kind}'")]
    UnknownKind { kind: String },

    /// Object has no kind field
    #[error("object is missing the 'kind' field")]
    MissingKind,

    /// Kind registered twice
    #[error("object kind '{kind}' is already registered")]
    DuplicateKind { kind: String },

    /// Policy file failed to decode
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// YAML serialization/deserialization error
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an error raised by one clause of a criteria
    pub fn criteria(clause: &'static str, source: Error) -> Self {
        Self::Criteria {
            clause,
            source: Box::new(source),
        }
    }
}
