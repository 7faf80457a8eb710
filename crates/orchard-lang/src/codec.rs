//! Encoding and decoding of policy objects.
//!
//! Objects are tagged records: the `kind` field picks a decoder from a
//! [`KindRegistry`]. Both YAML (multi-document) and JSON are supported;
//! a document may hold a single object or a list of objects.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::object::{Kind, PolicyObject};

type Decoder = fn(Value) -> Result<PolicyObject>;

fn decoder<T: DeserializeOwned>(wrap: fn(T) -> PolicyObject) -> impl Fn(Value) -> Result<PolicyObject> {
    move |value| Ok(wrap(serde_json::from_value(value)?))
}

/// Map of kind name to the decoder building that object
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    decoders: BTreeMap<String, Decoder>,
}

impl KindRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in kind
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Kind::Contract.as_str(), |v| decoder(PolicyObject::Contract)(v))?;
        registry.register(Kind::Bundle.as_str(), |v| decoder(PolicyObject::Bundle)(v))?;
        registry.register(Kind::Cluster.as_str(), |v| decoder(PolicyObject::Cluster)(v))?;
        registry.register(Kind::Rule.as_str(), |v| decoder(PolicyObject::Rule)(v))?;
        registry.register(Kind::AclRule.as_str(), |v| decoder(PolicyObject::AclRule)(v))?;
        registry.register(Kind::Claim.as_str(), |v| decoder(PolicyObject::Claim)(v))?;
        registry.check_complete()?;
        Ok(registry)
    }

    /// Register a decoder; a kind can only be registered once
    pub fn register(&mut self, kind: &str, decode: Decoder) -> Result<()> {
        if self.decoders.contains_key(kind) {
            return Err(Error::DuplicateKind {
                kind: kind.to_string(),
            });
        }
        self.decoders.insert(kind.to_string(), decode);
        Ok(())
    }

    /// Fail if a built-in kind has no decoder
    pub fn check_complete(&self) -> Result<()> {
        match Kind::ALL
            .iter()
            .find(|k| !self.decoders.contains_key(k.as_str()))
        {
            Some(missing) => Err(Error::UnknownKind {
                kind: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Registered kind names
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.decoders.keys().map(String::as_str)
    }

    /// Decode one tagged record
    pub fn decode_value(&self, value: Value) -> Result<PolicyObject> {
        let mut map = match value {
            Value::Object(map) => map,
            _ => return Err(Error::MissingKind),
        };
        let kind = match map.remove("kind") {
            Some(Value::String(kind)) => kind,
            _ => return Err(Error::MissingKind),
        };
        let decode = self
            .decoders
            .get(&kind)
            .ok_or_else(|| Error::UnknownKind { kind: kind.clone() })?;
        decode(Value::Object(map))
    }

    /// Decode a document holding either a single record or a list of records
    fn decode_document(&self, value: Value, into: &mut Vec<PolicyObject>) -> Result<()> {
        match value {
            Value::Null => Ok(()),
            Value::Array(items) => {
                for item in items {
                    into.push(self.decode_value(item)?);
                }
                Ok(())
            }
            other => {
                into.push(self.decode_value(other)?);
                Ok(())
            }
        }
    }
}

/// Text encoding of policy objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Format> {
        match path.extension()?.to_str()? {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

/// Encoder/decoder for one format, sharing a kind registry
#[derive(Debug, Clone)]
pub struct Codec {
    registry: KindRegistry,
    format: Format,
}

impl Codec {
    pub fn new(registry: KindRegistry, format: Format) -> Self {
        Self { registry, format }
    }

    pub fn yaml() -> Result<Self> {
        Ok(Self::new(KindRegistry::builtin()?, Format::Yaml))
    }

    pub fn json() -> Result<Self> {
        Ok(Self::new(KindRegistry::builtin()?, Format::Json))
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Decode every object in the text
    pub fn decode(&self, text: &str) -> Result<Vec<PolicyObject>> {
        let mut objects = Vec::new();
        match self.format {
            Format::Yaml => {
                for document in serde_yaml::Deserializer::from_str(text) {
                    let value = Value::deserialize(document)?;
                    self.registry.decode_document(value, &mut objects)?;
                }
            }
            Format::Json => {
                let value: Value = serde_json::from_str(text)?;
                self.registry.decode_document(value, &mut objects)?;
            }
        }
        Ok(objects)
    }

    /// Encode objects: one YAML document per object, or a JSON list
    pub fn encode(&self, objects: &[PolicyObject]) -> Result<String> {
        match self.format {
            Format::Yaml => {
                let mut out = String::new();
                for object in objects {
                    out.push_str("---\n");
                    out.push_str(&serde_yaml::to_string(object)?);
                }
                Ok(out)
            }
            Format::Json => Ok(serde_json::to_string_pretty(objects)?),
        }
    }
}

/// Load every `*.yaml`, `*.yml` and `*.json` file under `dir`, recursively,
/// in path order
pub fn load_dir(dir: &Path) -> Result<Vec<PolicyObject>> {
    let registry = KindRegistry::builtin()?;
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let mut objects = Vec::new();
    for path in files {
        let Some(format) = Format::from_path(&path) else {
            continue;
        };
        let text = std::fs::read_to_string(&path)?;
        let decoded = Codec::new(registry.clone(), format)
            .decode(&text)
            .map_err(|e| Error::Decode {
                path: path.clone(),
                source: Box::new(e),
            })?;
        tracing::debug!(?path, objects = decoded.len(), "loaded policy file");
        objects.extend(decoded);
    }
    Ok(objects)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const POLICY: &str = r#"
kind: contract
metadata: { namespace: main, name: db }
contexts:
  - name: default
    allocation: { bundle: pg }
---
kind: bundle
metadata: { namespace: main, name: pg }
components:
  - name: db
    code: { type: helm, params: { chart: postgres } }
---
- kind: cluster
  metadata: { namespace: system, name: k8s }
  type: kubernetes
- kind: claim
  metadata: { namespace: main, name: c1 }
  user: alice
  contract: db
"#;

    #[test]
    fn test_decode_yaml_documents_and_lists() {
        let objects = Codec::yaml().unwrap().decode(POLICY).unwrap();
        let kinds: Vec<Kind> = objects.iter().map(PolicyObject::kind).collect();
        assert_eq!(kinds, vec![Kind::Contract, Kind::Bundle, Kind::Cluster, Kind::Claim]);
    }

    #[test]
    fn test_yaml_and_json_agree() {
        let objects = Codec::yaml().unwrap().decode(POLICY).unwrap();
        let json = Codec::json().unwrap();
        let encoded = json.encode(&objects).unwrap();
        assert_eq!(json.decode(&encoded).unwrap(), objects);

        let yaml = Codec::yaml().unwrap();
        let encoded = yaml.encode(&objects).unwrap();
        assert_eq!(yaml.decode(&encoded).unwrap(), objects);
    }

    #[test]
    fn test_unknown_and_missing_kind() {
        let codec = Codec::yaml().unwrap();
        assert!(matches!(
            codec.decode("kind: service\nmetadata: {namespace: a, name: b}"),
            Err(Error::UnknownKind { kind }) if kind == "service"
        ));
        assert!(matches!(codec.decode("metadata: {namespace: a, name: b}"), Err(Error::MissingKind)));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = KindRegistry::builtin().unwrap();
        let err = registry
            .register("claim", |v| decoder(PolicyObject::Claim)(v))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKind { .. }));
    }

    #[test]
    fn test_incomplete_registry_is_rejected() {
        let mut registry = KindRegistry::new();
        registry
            .register("claim", |v| decoder(PolicyObject::Claim)(v))
            .unwrap();
        assert!(registry.check_complete().is_err());
    }

    #[test]
    fn test_load_dir_reports_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), POLICY).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/b.json"), "[]").unwrap();
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        assert_eq!(load_dir(dir.path()).unwrap().len(), 4);

        std::fs::write(dir.path().join("c.yml"), "kind: nope").unwrap();
        let err = load_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("c.yml"), "{}", err);
    }
}
