//! Object kinds, metadata and locators shared by every policy object

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bundle::Bundle;
use crate::claim::Claim;
use crate::cluster::Cluster;
use crate::contract::Contract;
use crate::error::{Error, Result};
use crate::rule::Rule;

/// Namespace holding clusters, ACL rules and global rules
pub const SYSTEM_NAMESPACE: &str = "system";

/// Discriminator of policy objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Contract,
    Bundle,
    Cluster,
    Rule,
    AclRule,
    Claim,
}

impl Kind {
    /// Every kind, in the order objects are listed
    pub const ALL: [Kind; 6] = [
        Kind::Cluster,
        Kind::AclRule,
        Kind::Rule,
        Kind::Bundle,
        Kind::Contract,
        Kind::Claim,
    ];

    /// The kind as written in policy files
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Contract => "contract",
            Kind::Bundle => "bundle",
            Kind::Cluster => "cluster",
            Kind::Rule => "rule",
            Kind::AclRule => "aclrule",
            Kind::Claim => "claim",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Kind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::UnknownKind {
                kind: s.to_string(),
            })
    }
}

/// Namespace and name of a policy object
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Metadata {
    pub namespace: String,
    pub name: String,
}

impl Metadata {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

/// Split a `[namespace/]name` locator, defaulting to `current_namespace`
pub fn split_locator<'a>(locator: &'a str, current_namespace: &'a str) -> Result<(&'a str, &'a str)> {
    let parts: Vec<&str> = locator.split('/').collect();
    match parts.as_slice() {
        [name] if !name.is_empty() => Ok((current_namespace, name)),
        [ns, name] if !ns.is_empty() && !name.is_empty() => Ok((ns, name)),
        _ => Err(Error::InvalidLocator {
            locator: locator.to_string(),
        }),
    }
}

/// Any policy object, tagged by its kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PolicyObject {
    Contract(Contract),
    Bundle(Bundle),
    Cluster(Cluster),
    Rule(Rule),
    AclRule(Rule),
    Claim(Claim),
}

impl PolicyObject {
    pub fn kind(&self) -> Kind {
        match self {
            PolicyObject::Contract(_) => Kind::Contract,
            PolicyObject::Bundle(_) => Kind::Bundle,
            PolicyObject::Cluster(_) => Kind::Cluster,
            PolicyObject::Rule(_) => Kind::Rule,
            PolicyObject::AclRule(_) => Kind::AclRule,
            PolicyObject::Claim(_) => Kind::Claim,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            PolicyObject::Contract(o) => &o.metadata,
            PolicyObject::Bundle(o) => &o.metadata,
            PolicyObject::Cluster(o) => &o.metadata,
            PolicyObject::Rule(o) | PolicyObject::AclRule(o) => &o.metadata,
            PolicyObject::Claim(o) => &o.metadata,
        }
    }

    /// `namespace/kind/name`
    pub fn key(&self) -> String {
        object_key(self.kind(), self.metadata())
    }
}

/// Format an object key as `namespace/kind/name`
pub fn object_key(kind: Kind, metadata: &Metadata) -> String {
    format!("{}/{}/{}", metadata.namespace, kind, metadata.name)
}
