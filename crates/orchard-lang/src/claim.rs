//! Claims: a user's request for an instance of a contract

use serde::{Deserialize, Serialize};

use crate::labels::Labels;
use crate::object::Metadata;

/// Request for an instance of a contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub metadata: Metadata,

    /// Name of the user the claim is made on behalf of
    pub user: String,

    /// Contract locator, `[namespace/]name`
    pub contract: String,

    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
}

impl Claim {
    /// Claim key, `namespace/name`
    pub fn key(&self) -> String {
        format!("{}/{}", self.metadata.namespace, self.metadata.name)
    }
}
