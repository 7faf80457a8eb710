//! Component instance keys

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Error;

pub use orchard_lang::bundle::BUNDLE_COMPONENT;

/// Separator between the fields of the string form
pub const KEY_SEPARATOR: char = '#';

/// Target suffix used when the target label has none
pub const UNKNOWN_SUFFIX: &str = "unknown";

/// Identity of a resolved graph node.
///
/// Two claims resolving to equal keys share one instance. Rendered as the
/// fields joined with `#`, which is also its serialized form, so no field
/// may contain the separator (see [`check_key_part`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ComponentInstanceKey {
    pub cluster_namespace: String,
    pub cluster_name: String,
    pub target_suffix: String,
    pub namespace: String,
    pub contract: String,
    pub context: String,
    /// Evaluated allocation keys
    pub keys: Vec<String>,
    pub bundle: String,
    pub component: String,
}

impl ComponentInstanceKey {
    /// Key of another component of the same bundle instance
    pub fn with_component(&self, component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            ..self.clone()
        }
    }

    /// Key of the bundle-level instance
    pub fn bundle_key(&self) -> Self {
        self.with_component(BUNDLE_COMPONENT)
    }

    pub fn is_bundle(&self) -> bool {
        self.component == BUNDLE_COMPONENT
    }

    /// Context part, including the allocation keys
    fn context_with_keys(&self) -> String {
        let mut parts = vec![self.context.as_str()];
        parts.extend(self.keys.iter().map(String::as_str));
        parts.join("#")
    }

    /// Stable short name used by deployment backends: `o-` and 13 hex chars
    pub fn deploy_name(&self) -> String {
        format!("o-{}", &self.digest()[..13])
    }

    /// Stable instance id: 16 hex chars
    pub fn instance_id(&self) -> String {
        self.digest()[..16].to_string()
    }

    fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.to_string().as_bytes()))
    }
}

/// Make sure a value computed during resolution can be a key field
pub fn check_key_part(field: &'static str, value: &str) -> Result<(), Error> {
    if value.contains(KEY_SEPARATOR) {
        return Err(Error::InvalidKeyPart {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

impl fmt::Display for ComponentInstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}#{}#{}#{}#{}#{}#{}",
            self.cluster_namespace,
            self.cluster_name,
            self.target_suffix,
            self.namespace,
            self.contract,
            self.context_with_keys(),
            self.bundle,
            self.component
        )
    }
}

impl From<ComponentInstanceKey> for String {
    fn from(key: ComponentInstanceKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for ComponentInstanceKey {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self, Error> {
        raw.parse()
    }
}

impl std::str::FromStr for ComponentInstanceKey {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Error> {
        let parts: Vec<&str> = raw.split(KEY_SEPARATOR).collect();
        if parts.len() < 8 {
            return Err(Error::InvalidKey {
                key: raw.to_string(),
            });
        }
        let n = parts.len();
        Ok(Self {
            cluster_namespace: parts[0].to_string(),
            cluster_name: parts[1].to_string(),
            target_suffix: parts[2].to_string(),
            namespace: parts[3].to_string(),
            contract: parts[4].to_string(),
            context: parts[5].to_string(),
            keys: parts[6..n - 2].iter().map(|s| s.to_string()).collect(),
            bundle: parts[n - 2].to_string(),
            component: parts[n - 1].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(keys: &[&str]) -> ComponentInstanceKey {
        ComponentInstanceKey {
            cluster_namespace: "system".to_string(),
            cluster_name: "k8s".to_string(),
            target_suffix: UNKNOWN_SUFFIX.to_string(),
            namespace: "main".to_string(),
            contract: "db".to_string(),
            context: "prod".to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            bundle: "pg".to_string(),
            component: "server".to_string(),
        }
    }

    #[test]
    fn test_key_string_form() {
        assert_eq!(
            key(&["red"]).to_string(),
            "system#k8s#unknown#main#db#prod#red#pg#server"
        );
        assert_eq!(key(&[]).bundle_key().to_string(), "system#k8s#unknown#main#db#prod#pg#root");
    }

    #[test]
    fn test_key_parses_back() {
        for keys in [&[][..], &["red"][..], &["red", "eu"][..]] {
            let k = key(keys);
            assert_eq!(k.to_string().parse::<ComponentInstanceKey>().unwrap(), k);
        }
        assert!("a#b#c".parse::<ComponentInstanceKey>().is_err());

        // a separator inside a field would split it apart
        let broken = key(&["red#blue"]);
        assert_ne!(broken.to_string().parse::<ComponentInstanceKey>().unwrap(), broken);
        assert!(matches!(
            check_key_part("allocation key", "red#blue"),
            Err(Error::InvalidKeyPart { field: "allocation key", .. })
        ));
        assert!(check_key_part("allocation key", "red-blue").is_ok());
    }

    #[test]
    fn test_json_uses_string_form() {
        let k = key(&["red"]);
        let json = serde_json::to_string(&k).unwrap();
        assert_eq!(json, format!("\"{}\"", k));
        assert_eq!(serde_json::from_str::<ComponentInstanceKey>(&json).unwrap(), k);
    }

    #[test]
    fn test_deploy_name_is_stable() {
        let name = key(&[]).deploy_name();
        assert_eq!(name.len(), 15);
        assert!(name.starts_with("o-"));
        assert_eq!(name, key(&[]).deploy_name());
        assert_ne!(name, key(&["red"]).deploy_name());
        assert_eq!(key(&[]).instance_id().len(), 16);
    }
}
