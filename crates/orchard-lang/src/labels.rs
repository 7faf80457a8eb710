//! Label sets and label transforms

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Plain label map
pub type Labels = BTreeMap<String, String>;

/// A mutable set of labels attached to a claim while it is being resolved
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet {
    labels: Labels,
}

impl LabelSet {
    /// Create a label set from a map
    pub fn new(labels: Labels) -> Self {
        Self { labels }
    }

    /// Borrow the labels
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Get a single label
    pub fn get(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    /// Add labels, overriding existing values
    pub fn add_labels(&mut self, labels: &Labels) {
        for (k, v) in labels {
            self.labels.insert(k.clone(), v.clone());
        }
    }

    /// Apply set/remove operations. Returns true if anything changed.
    pub fn apply_transform(&mut self, ops: &LabelOperations) -> bool {
        let mut changed = false;
        for (k, v) in &ops.set {
            if self.labels.get(k) != Some(v) {
                self.labels.insert(k.clone(), v.clone());
                changed = true;
            }
        }
        for k in &ops.remove {
            if self.labels.remove(k).is_some() {
                changed = true;
            }
        }
        changed
    }

    /// Consume the set, returning the labels
    pub fn into_labels(self) -> Labels {
        self.labels
    }
}

/// Label transform attached to contracts, contexts and rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelOperations {
    /// Labels to set (overriding existing values)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set: Labels,

    /// Labels to remove
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

impl LabelOperations {
    /// Whether the transform does nothing
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }

    /// Build a transform that sets the given labels
    pub fn set<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            set: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            remove: Vec::new(),
        }
    }

    /// Build a transform that removes the given labels
    pub fn remove<K: Into<String>>(names: impl IntoIterator<Item = K>) -> Self {
        Self {
            set: Labels::new(),
            remove: names.into_iter().map(Into::into).collect(),
        }
    }
}
