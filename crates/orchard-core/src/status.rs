//! Claim and revision status queries

use std::fmt;
use std::str::FromStr;

use orchard_engine::{ComponentInstanceKey, PluginParams, Resources};
use serde::Serialize;

use crate::enforcer::Enforcer;
use crate::error::{Error, Result};
use crate::revision::Revision;
use crate::store::RevisionStore;

/// How deep a claim status query looks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFlag {
    /// Instances exist in the actual state
    Deployment,
    /// Instances exist and their plugins report them ready
    Readiness,
}

/// Status of one claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimStatus {
    /// `namespace/name`
    pub claim: String,
    pub found: bool,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Instances the claim resolves to
    pub instances: usize,
    /// How many of them are deployed with the claim attached
    pub deployed: usize,
    /// Only filled by readiness queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
}

impl ClaimStatus {
    fn not_found(claim: &str) -> Self {
        Self {
            claim: claim.to_string(),
            found: false,
            resolved: false,
            reason: Some("claim not found".to_string()),
            instances: 0,
            deployed: 0,
            ready: None,
        }
    }

    pub fn is_deployed(&self) -> bool {
        self.resolved && self.deployed == self.instances
    }
}

impl Enforcer {
    /// Status of each claim in `ids` (`namespace/name`), in the given order
    pub async fn claim_status(&self, ids: &[String], flag: StatusFlag) -> Result<Vec<ClaimStatus>> {
        let preview = self.preview()?;
        let mut statuses = Vec::with_capacity(ids.len());

        for id in ids {
            let Some(resolution) = preview.desired.claims.get(id) else {
                statuses.push(ClaimStatus::not_found(id));
                continue;
            };
            let wanted = preview.desired.claim_instances(id);
            let deployed: Vec<_> = wanted
                .iter()
                .filter_map(|w| preview.actual.instance(&w.key))
                .filter(|have| have.claim_keys.contains(id))
                .collect();

            let mut status = ClaimStatus {
                claim: id.clone(),
                found: true,
                resolved: resolution.resolved,
                reason: resolution.reason.clone(),
                instances: wanted.len(),
                deployed: deployed.len(),
                ready: None,
            };

            if flag == StatusFlag::Readiness {
                let mut ready = status.is_deployed();
                for instance in deployed.iter().filter(|i| i.is_code) {
                    if !ready {
                        break;
                    }
                    let plugin = self
                        .plugins()
                        .get(&instance.cluster_type, &instance.code_type)?;
                    match plugin.status(&PluginParams::from_instance(instance)).await {
                        Ok(ok) => ready = ok,
                        Err(e) => {
                            tracing::warn!(claim = %id, key = %instance.key, error = %e, "Status check failed");
                            status.reason = Some(e.to_string());
                            ready = false;
                        }
                    }
                }
                status.ready = Some(ready);
            }
            statuses.push(status);
        }
        Ok(statuses)
    }
}

/// Cluster resources behind one deployed code instance of a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceResources {
    pub key: ComponentInstanceKey,
    pub deploy_name: String,
    pub resources: Resources,
}

impl Enforcer {
    /// Resources of the code instances deployed for a claim, as reported by
    /// their plugins. Instances not deployed yet are left out.
    pub async fn claim_resources(&self, id: &str) -> Result<Vec<InstanceResources>> {
        let preview = self.preview()?;
        if !preview.desired.claims.contains_key(id) {
            return Err(Error::ClaimNotFound {
                claim: id.to_string(),
            });
        }

        let mut result = Vec::new();
        for wanted in preview.desired.claim_instances(id) {
            let Some(have) = preview.actual.instance(&wanted.key) else {
                continue;
            };
            if !have.is_code || !have.claim_keys.contains(id) {
                continue;
            }
            let plugin = self.plugins().get(&have.cluster_type, &have.code_type)?;
            let resources = plugin.resources(&PluginParams::from_instance(have)).await?;
            tracing::debug!(claim = %id, key = %have.key, "Collected instance resources");
            result.push(InstanceResources {
                key: have.key.clone(),
                deploy_name: have.deploy_name(),
                resources,
            });
        }
        Ok(result)
    }
}

/// Which revision a status query is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionSelector {
    Generation(u64),
    /// The latest revision enforcing this policy generation
    PolicyGeneration(u64),
    Last,
}

impl fmt::Display for RevisionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionSelector::Generation(g) => write!(f, "generation {}", g),
            RevisionSelector::PolicyGeneration(g) => write!(f, "policy generation {}", g),
            RevisionSelector::Last => f.write_str("last revision"),
        }
    }
}

/// Parses `last`, `<n>` (revision generation) or `policy:<n>`
impl FromStr for RevisionSelector {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parse = |n: &str| {
            n.trim()
                .parse::<u64>()
                .map_err(|_| format!("invalid revision selector '{}'", s))
        };
        match s.trim() {
            "last" => Ok(RevisionSelector::Last),
            other => match other.strip_prefix("policy:") {
                Some(n) => parse(n).map(RevisionSelector::PolicyGeneration),
                None => parse(other).map(RevisionSelector::Generation),
            },
        }
    }
}

/// Look up a revision
pub fn revision_status<S: RevisionStore + ?Sized>(store: &S, selector: RevisionSelector) -> Result<Revision> {
    let found = match selector {
        RevisionSelector::Generation(g) => store.revision(g)?,
        RevisionSelector::PolicyGeneration(g) => store
            .revisions()?
            .into_iter()
            .rev()
            .find(|r| r.policy_generation == g),
        RevisionSelector::Last => store.last_revision()?,
    };
    found.ok_or_else(|| Error::RevisionNotFound {
        selector: selector.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rstest::rstest;

    #[rstest]
    #[case("last", RevisionSelector::Last)]
    #[case("7", RevisionSelector::Generation(7))]
    #[case("policy:3", RevisionSelector::PolicyGeneration(3))]
    fn test_parse_selector(#[case] input: &str, #[case] expected: RevisionSelector) {
        assert_eq!(input.parse::<RevisionSelector>().unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("policy:")]
    #[case("latest")]
    fn test_parse_selector_rejects_garbage(#[case] input: &str) {
        assert!(input.parse::<RevisionSelector>().is_err());
    }

    #[test]
    fn test_revision_status_by_policy_generation_picks_latest() {
        let store = MemoryStore::new();
        store.create_revision(2).unwrap();
        store.create_revision(2).unwrap();
        store.create_revision(3).unwrap();

        let found = revision_status(&store, RevisionSelector::PolicyGeneration(2)).unwrap();
        assert_eq!(found.generation, 2);
        assert_eq!(revision_status(&store, RevisionSelector::Last).unwrap().generation, 3);

        let err = revision_status(&store, RevisionSelector::Generation(9)).unwrap_err();
        assert_eq!(err.to_string(), "revision not found: generation 9");
    }
}
