//! The claim resolution algorithm

use std::collections::{BTreeMap, BTreeSet};

use orchard_lang::cluster::TARGET_LABEL;
use orchard_lang::criteria;
use orchard_lang::object::SYSTEM_NAMESPACE;
use orchard_lang::params::process_parameter_tree;
use orchard_lang::rule::{self, RuleActionResult};
use orchard_lang::{
    Claim, Cluster, LabelSet, Labels, ParameterTree, Params, Policy, Target, TemplateParams, User,
};
use serde_json::{Map, Value, json};

use super::context::ResolutionContext;
use super::instance::{ALLOW_INGRESS, ComponentInstance};
use super::key::{BUNDLE_COMPONENT, ComponentInstanceKey, UNKNOWN_SUFFIX, check_key_part};
use super::resolution::{ClaimResolution, PolicyResolution};
use crate::error::{Error, Result};
use crate::event::EventLog;

/// Desired state produced by a resolution pass, with its log
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub state: PolicyResolution,
    pub log: EventLog,
}

/// Resolve every claim of a policy
pub fn resolve(policy: &Policy, users: &BTreeMap<String, User>, ctx: &ResolutionContext) -> Resolution {
    Resolver::new(policy, users, ctx).resolve_all()
}

enum Outcome {
    Resolved(ComponentInstanceKey),
    Unresolved(String),
}

/// A contract to resolve on behalf of a claim: the claim itself, or a
/// contract referenced by one of the components on the way
struct Node<'n> {
    claim: &'n Claim,
    user: &'n User,
    claim_object: &'n Value,
    namespace: String,
    contract: String,
    labels: LabelSet,
    /// Instance that depends on the bundle this node lands on
    arrival: Option<ComponentInstanceKey>,
    /// Bundle instances currently being resolved, outermost first
    path: Vec<ComponentInstanceKey>,
}

/// Expands claims into component instances
pub struct Resolver<'a> {
    policy: &'a Policy,
    users: &'a BTreeMap<String, User>,
    ctx: &'a ResolutionContext,
}

impl<'a> Resolver<'a> {
    pub fn new(policy: &'a Policy, users: &'a BTreeMap<String, User>, ctx: &'a ResolutionContext) -> Self {
        Self { policy, users, ctx }
    }

    /// Resolve every claim independently and merge the successful ones.
    ///
    /// A failing claim is recorded as unresolved and logged; it never stops
    /// the other claims.
    pub fn resolve_all(&self) -> Resolution {
        let mut state = PolicyResolution::new();
        let mut log = EventLog::new("resolve");

        for claim in self.policy.claims() {
            let claim_key = claim.key();
            let status = match self.resolve_claim(claim) {
                Ok((local, status)) if status.resolved => match state.merge(local) {
                    Ok(()) => {
                        log.debug("claim resolved", &[claim_key.as_str()]);
                        status
                    }
                    Err(e) => {
                        let e = Error::resolution(&claim_key, e);
                        log.error(e.to_string(), &[claim_key.as_str()]);
                        ClaimResolution::unresolved(e.to_string())
                    }
                },
                Ok((_, status)) => {
                    let reason = status.reason.as_deref().unwrap_or("unresolved");
                    log.warn(format!("claim not resolved: {}", reason), &[claim_key.as_str()]);
                    status
                }
                Err(e) => {
                    let e = Error::resolution(&claim_key, e);
                    log.error(e.to_string(), &[claim_key.as_str()]);
                    ClaimResolution::unresolved(e.to_string())
                }
            };
            state.set_claim(claim_key, status);
        }

        let resolved = state.claims.values().filter(|c| c.resolved).count();
        log.info(
            format!(
                "resolved {} of {} claims into {} instances",
                resolved,
                state.claims.len(),
                state.len()
            ),
            &[],
        );
        Resolution { state, log }
    }

    /// Resolve one claim into a snapshot of its own.
    ///
    /// Unresolved claims (missing user or contract, rejected by rules, no
    /// matching context) come back as `Ok` with an empty snapshot; errors
    /// are hard failures of this claim.
    pub fn resolve_claim(&self, claim: &Claim) -> Result<(PolicyResolution, ClaimResolution)> {
        let Some(user) = self.users.get(&claim.user) else {
            return Ok((
                PolicyResolution::new(),
                ClaimResolution::unresolved(format!("user '{}' not found", claim.user)),
            ));
        };

        let claim_value = claim_object(claim);
        let node = Node {
            claim,
            user,
            claim_object: &claim_value,
            namespace: claim.metadata.namespace.clone(),
            contract: claim.contract.clone(),
            labels: LabelSet::new(claim.labels.clone()),
            arrival: None,
            path: Vec::new(),
        };

        let mut local = PolicyResolution::new();
        match self.resolve_node(node, &mut local)? {
            Outcome::Resolved(root) => Ok((local, ClaimResolution::resolved(root))),
            Outcome::Unresolved(reason) => {
                Ok((PolicyResolution::new(), ClaimResolution::unresolved(reason)))
            }
        }
    }

    fn resolve_node(&self, node: Node<'_>, local: &mut PolicyResolution) -> Result<Outcome> {
        let contract = match self.policy.contract(&node.contract, &node.namespace) {
            Ok(contract) => contract,
            Err(e) => return Ok(Outcome::Unresolved(e.to_string())),
        };
        let ns = contract.metadata.namespace.as_str();

        let mut labels = node.labels;
        labels.apply_transform(&contract.change_labels);

        // namespace rules first, then global ones
        let mut rules = self.policy.rules(ns);
        if ns != SYSTEM_NAMESPACE {
            rules.extend(self.policy.rules(SYSTEM_NAMESPACE));
        }
        let mut result = RuleActionResult::new(labels);
        rule::apply_rules(rules, &mut result, &self.ctx.expressions, |l| {
            expression_params(l, node.claim_object)
        })?;
        if result.claim_rejected {
            return Ok(Outcome::Unresolved(format!(
                "rejected by rules ({})",
                result.matched.join(", ")
            )));
        }
        let ingress_allowed = result.ingress_allowed;
        let mut labels = result.labels;

        let params = expression_params(labels.labels(), node.claim_object);
        let Some(context) = contract.find_matching_context(&params, &self.ctx.expressions)? else {
            return Ok(Outcome::Unresolved(format!(
                "no context matched in contract '{}/{}'",
                ns, contract.metadata.name
            )));
        };

        let bundle = self.policy.bundle(&context.allocation.bundle, ns)?;
        self.policy.view(node.user).can_consume(bundle)?;
        labels.apply_transform(&context.change_labels);

        let user_object = user_object(node.user);
        let base = TemplateParams::new(json!({
            "User": user_object,
            "Claim": node.claim_object,
            "Labels": labels.labels(),
        }));
        let keys = context
            .allocation
            .keys
            .iter()
            .map(|k| self.ctx.templates.evaluate(k, &base))
            .collect::<orchard_lang::Result<Vec<_>>>()?;
        for key in &keys {
            check_key_part("allocation key", key)?;
        }

        let (cluster, target) = self.resolve_target(&labels, ns)?;
        check_key_part("target suffix", &target.suffix)?;
        let bundle_key = ComponentInstanceKey {
            cluster_namespace: cluster.metadata.namespace.clone(),
            cluster_name: cluster.metadata.name.clone(),
            target_suffix: if target.suffix.is_empty() {
                UNKNOWN_SUFFIX.to_string()
            } else {
                target.suffix.clone()
            },
            namespace: ns.to_string(),
            contract: contract.metadata.name.clone(),
            context: context.name.clone(),
            keys,
            bundle: bundle.metadata.name.clone(),
            component: BUNDLE_COMPONENT.to_string(),
        };

        if node.path.contains(&bundle_key) {
            let path: Vec<String> = node
                .path
                .iter()
                .chain(std::iter::once(&bundle_key))
                .map(ToString::to_string)
                .collect();
            return Err(Error::CrossContractCycle {
                path: path.join(" -> "),
            });
        }
        let mut path = node.path;
        path.push(bundle_key.clone());

        if let Some(arrival) = &node.arrival {
            local.store_edge(arrival, &bundle_key);
        }

        tracing::trace!(
            claim = %node.claim.key(),
            contract = %contract.metadata.name,
            context = %context.name,
            bundle = %bundle_key,
            "resolving bundle"
        );

        let mut discovery = ParameterTree::new();
        let mut included: BTreeSet<&str> = BTreeSet::new();

        for component in bundle.sorted_components()? {
            if component.name == BUNDLE_COMPONENT {
                return Err(Error::ReservedComponent {
                    bundle: bundle.metadata.name.clone(),
                    component: component.name.clone(),
                });
            }
            let params = expression_params(labels.labels(), node.claim_object);
            if !criteria::matches(component.criteria.as_ref(), &params, &self.ctx.expressions)? {
                tracing::trace!(component = %component.name, "component excluded by criteria");
                continue;
            }
            included.insert(component.name.as_str());

            let key = bundle_key.with_component(&component.name);
            local.store_edge(&bundle_key, &key);
            for dep in &component.dependencies {
                if included.contains(dep.as_str()) {
                    local.store_edge(&key, &bundle_key.with_component(dep));
                }
            }

            let mut visible = discovery.clone();
            visible.insert("Instance".to_string(), key.deploy_name().into());
            visible.insert("InstanceId".to_string(), key.instance_id().into());
            visible.insert(
                "Bundle".to_string(),
                json!({
                    "Instance": bundle_key.deploy_name(),
                    "InstanceId": bundle_key.instance_id(),
                }),
            );
            let template_params = TemplateParams::new(json!({
                "User": user_object,
                "Claim": node.claim_object,
                "Labels": labels.labels(),
                "Discovery": visible,
                "Target": { "Namespace": target.suffix },
            }));

            let component_discovery =
                process_parameter_tree(&component.discovery, &template_params, &self.ctx.templates)?;
            let mut published = component_discovery.clone();
            published.insert("instance".to_string(), key.deploy_name().into());
            discovery.insert(component.name.clone(), Value::Object(published));

            let mut instance = match &component.code {
                Some(code) => {
                    let code_params =
                        process_parameter_tree(&code.params, &template_params, &self.ctx.templates)?;
                    let mut instance = ComponentInstance::code(
                        key.clone(),
                        &cluster.cluster_type,
                        &code.code_type,
                        code_params,
                    );
                    instance
                        .plugin_data
                        .insert(ALLOW_INGRESS.to_string(), ingress_allowed.to_string());
                    instance
                }
                None => ComponentInstance::service(key.clone(), &cluster.cluster_type),
            };
            instance.discovery = component_discovery;
            instance.labels = labels.labels().clone();
            instance.claim_keys.insert(node.claim.key());

            if let Some(reference) = &component.contract {
                let child = Node {
                    claim: node.claim,
                    user: node.user,
                    claim_object: node.claim_object,
                    namespace: ns.to_string(),
                    contract: reference.clone(),
                    labels: labels.clone(),
                    arrival: Some(key.clone()),
                    path: path.clone(),
                };
                if let Outcome::Unresolved(reason) = self.resolve_node(child, local)? {
                    return Ok(Outcome::Unresolved(format!(
                        "component '{}' of bundle '{}': {}",
                        component.name, bundle.metadata.name, reason
                    )));
                }
            }

            local.record(instance)?;
        }

        let mut bundle_instance = ComponentInstance::service(bundle_key.clone(), &cluster.cluster_type);
        bundle_instance.labels = labels.into_labels();
        bundle_instance.claim_keys.insert(node.claim.key());
        local.record(bundle_instance)?;

        Ok(Outcome::Resolved(bundle_key))
    }

    /// Pick the cluster named by the `target` label. Without an explicit
    /// namespace the contract's namespace is tried, then the system one.
    fn resolve_target(&self, labels: &LabelSet, namespace: &str) -> Result<(&'a Cluster, Target)> {
        let raw = labels.get(TARGET_LABEL).ok_or(Error::TargetMissing {
            label: TARGET_LABEL,
        })?;
        let target = Target::parse(raw).ok_or_else(|| Error::InvalidTarget {
            target: raw.to_string(),
        })?;

        let cluster = match &target.namespace {
            Some(explicit) => self.policy.cluster(&target.cluster, explicit).ok(),
            None => self
                .policy
                .cluster(&target.cluster, namespace)
                .or_else(|_| self.policy.cluster(&target.cluster, SYSTEM_NAMESPACE))
                .ok(),
        };
        match cluster {
            Some(cluster) => Ok((cluster, target)),
            None => Err(Error::ClusterNotFound {
                cluster: target.cluster.clone(),
                namespace: target.namespace.as_deref().unwrap_or(namespace).to_string(),
            }),
        }
    }
}

fn claim_object(claim: &Claim) -> Value {
    json!({
        "ID": claim.key(),
        "Name": claim.metadata.name,
        "Namespace": claim.metadata.namespace,
        "User": claim.user,
        "Contract": claim.contract,
        "Labels": claim.labels,
    })
}

/// Labels plus the claim, reachable as `Claim.<field>`
fn expression_params(labels: &Labels, claim: &Value) -> Params {
    let mut objects = Map::new();
    objects.insert("Claim".to_string(), claim.clone());
    Params::new(labels, objects)
}

fn user_object(user: &User) -> Value {
    json!({
        "Name": user.name,
        "Labels": user.labels,
        "Secrets": user.secrets,
    })
}
