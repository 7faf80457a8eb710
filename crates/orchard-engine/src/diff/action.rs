//! Plan actions

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resolve::ComponentInstanceKey;

/// One operation on a component instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Action {
    Create { key: ComponentInstanceKey },
    Update { key: ComponentInstanceKey },
    Delete { key: ComponentInstanceKey },
    AttachClaim { key: ComponentInstanceKey, claim: String },
    DetachClaim { key: ComponentInstanceKey, claim: String },
    RefreshEndpoints { key: ComponentInstanceKey },
}

impl Action {
    pub fn key(&self) -> &ComponentInstanceKey {
        match self {
            Action::Create { key }
            | Action::Update { key }
            | Action::Delete { key }
            | Action::AttachClaim { key, .. }
            | Action::DetachClaim { key, .. }
            | Action::RefreshEndpoints { key } => key,
        }
    }

    /// Short name of the action
    pub fn name(&self) -> &'static str {
        match self {
            Action::Create { .. } => "create",
            Action::Update { .. } => "update",
            Action::Delete { .. } => "delete",
            Action::AttachClaim { .. } => "attach",
            Action::DetachClaim { .. } => "detach",
            Action::RefreshEndpoints { .. } => "endpoints",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::AttachClaim { key, claim } => write!(f, "attach {} to {}", claim, key),
            Action::DetachClaim { key, claim } => write!(f, "detach {} from {}", claim, key),
            _ => write!(f, "{} {}", self.name(), self.key()),
        }
    }
}
