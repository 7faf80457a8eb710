//! Resolved component instances

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use orchard_lang::{Labels, ParameterTree};
use serde::{Deserialize, Serialize};

use super::key::ComponentInstanceKey;
use crate::error::{Error, Result};

/// Plugin data flag recording the ingress decision of the rules
pub const ALLOW_INGRESS: &str = "allow_ingress";

/// A node of the resolved graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInstance {
    pub key: ComponentInstanceKey,

    /// Code instances are deployed by plugins; the rest are bookkeeping
    pub is_code: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code_type: String,

    /// Type of the target cluster
    pub cluster_type: String,

    #[serde(default, skip_serializing_if = "ParameterTree::is_empty")]
    pub code_params: ParameterTree,

    #[serde(default, skip_serializing_if = "ParameterTree::is_empty")]
    pub discovery: ParameterTree,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub plugin_data: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,

    /// Keys of the claims referencing this instance
    #[serde(default)]
    pub claim_keys: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub endpoints: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints_updated_at: Option<DateTime<Utc>>,

    /// Set on actual instances whose endpoints haven't been read since the
    /// last create or update
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub endpoints_stale: bool,
}

impl ComponentInstance {
    /// A bookkeeping instance (bundle or contract reference)
    pub fn service(key: ComponentInstanceKey, cluster_type: impl Into<String>) -> Self {
        Self {
            key,
            is_code: false,
            code_type: String::new(),
            cluster_type: cluster_type.into(),
            code_params: ParameterTree::new(),
            discovery: ParameterTree::new(),
            plugin_data: BTreeMap::new(),
            labels: Labels::new(),
            claim_keys: BTreeSet::new(),
            endpoints: BTreeMap::new(),
            created_at: None,
            updated_at: None,
            endpoints_updated_at: None,
            endpoints_stale: false,
        }
    }

    /// A deployable code instance
    pub fn code(
        key: ComponentInstanceKey,
        cluster_type: impl Into<String>,
        code_type: impl Into<String>,
        code_params: ParameterTree,
    ) -> Self {
        Self {
            is_code: true,
            code_type: code_type.into(),
            code_params,
            ..Self::service(key, cluster_type)
        }
    }

    /// Deployment name used by plugins
    pub fn deploy_name(&self) -> String {
        self.key.deploy_name()
    }

    /// Fold another resolution of the same key into this one.
    ///
    /// Calculated parameters must agree; claim keys, labels and plugin data
    /// are merged.
    pub fn merge(&mut self, other: &ComponentInstance) -> Result<()> {
        self.check_compatible(other)?;
        self.claim_keys.extend(other.claim_keys.iter().cloned());
        for (k, v) in &other.labels {
            self.labels.insert(k.clone(), v.clone());
        }
        for (k, v) in &other.plugin_data {
            self.plugin_data.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    /// Fail if the other instance calculated different parameters
    pub fn check_compatible(&self, other: &ComponentInstance) -> Result<()> {
        if self.code_params != other.code_params {
            return Err(Error::InstanceConflict {
                key: self.key.to_string(),
                what: "code parameters",
            });
        }
        if self.discovery != other.discovery {
            return Err(Error::InstanceConflict {
                key: self.key.to_string(),
                what: "discovery parameters",
            });
        }
        Ok(())
    }
}
