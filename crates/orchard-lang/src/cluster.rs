//! Clusters and deployment targets

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::labels::Labels;
use crate::object::Metadata;
use crate::params::ParameterTree;

/// Label selecting the cluster a claim deploys to
pub const TARGET_LABEL: &str = "target";

/// A named deployment target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub metadata: Metadata,

    /// Type tag used to pick a deployment plugin
    #[serde(rename = "type")]
    pub cluster_type: String,

    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,

    /// Backend-specific configuration
    #[serde(default, skip_serializing_if = "ParameterTree::is_empty")]
    pub config: ParameterTree,
}

/// Parsed value of the `target` label: `[namespace/]cluster[.suffix]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub namespace: Option<String>,
    pub cluster: String,
    pub suffix: String,
}

impl Target {
    /// Parse a target label. Returns `None` when the cluster name is empty.
    pub fn parse(raw: &str) -> Option<Self> {
        let (namespace, rest) = match raw.split_once('/') {
            Some((ns, rest)) => (Some(ns.to_string()).filter(|ns| !ns.is_empty()), rest),
            None => (None, raw),
        };
        let (cluster, suffix) = match rest.split_once('.') {
            Some((cluster, suffix)) => (cluster, suffix),
            None => (rest, ""),
        };
        if cluster.is_empty() {
            return None;
        }
        Some(Self {
            namespace,
            cluster: cluster.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// Cluster locator (`namespace/cluster` or `cluster`)
    pub fn cluster_locator(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.cluster),
            None => self.cluster.clone(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cluster_locator())?;
        if !self.suffix.is_empty() {
            write!(f, ".{}", self.suffix)?;
        }
        Ok(())
    }
}
