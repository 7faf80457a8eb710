//! The reconciliation loop
//!
//! One cycle loads the latest policy generation, resolves it into the desired
//! state, diffs that against the stored actual state and applies the plan.
//! Cycles with work to do are recorded as revisions.

use std::collections::BTreeMap;
use std::sync::Arc;

use orchard_engine::apply::ProgressSnapshot;
use orchard_engine::{
    ActionPlan, ApplyEngine, ComponentInstanceKey, EventLog, PluginRegistry, PolicyResolution,
    Progress, Resolution, ResolutionContext, StepOutcome, diff, render, resolve,
};
use orchard_lang::{Policy, UserLoader};
use tokio::sync::{Mutex, Notify, watch};

use crate::config::EnforcerConfig;
use crate::error::Result;
use crate::revision::{Revision, RevisionStatus};
use crate::store::Store;

/// Outcome of resolving and diffing without applying anything
#[derive(Debug, Clone)]
pub struct PlanPreview {
    pub policy_generation: u64,
    pub desired: PolicyResolution,
    pub actual: PolicyResolution,
    pub plan: ActionPlan,
    pub resolve_log: EventLog,
}

impl PlanPreview {
    /// Human readable plan
    pub fn render(&self) -> String {
        render(&self.plan, &self.desired, &self.actual)
    }
}

/// What one enforcement cycle did
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub policy_generation: u64,
    pub plan: ActionPlan,
    /// The revision created for the cycle, `None` when there was nothing to do
    pub revision: Option<Revision>,
    pub outcomes: BTreeMap<ComponentInstanceKey, StepOutcome>,
}

impl CycleReport {
    pub fn is_skipped(&self) -> bool {
        self.revision.is_none()
    }
}

/// Drives the actual state towards the policy.
///
/// Cycles never overlap: [`Enforcer::enforce_once`] holds an async lock for
/// the whole cycle, so a manual trigger waits for a running timer cycle.
pub struct Enforcer {
    store: Arc<dyn Store>,
    users: Arc<dyn UserLoader>,
    plugins: PluginRegistry,
    ctx: ResolutionContext,
    config: EnforcerConfig,
    progress: Arc<Progress>,
    cycle: Mutex<()>,
}

impl Enforcer {
    pub fn new(
        store: Arc<dyn Store>,
        users: Arc<dyn UserLoader>,
        plugins: PluginRegistry,
        config: EnforcerConfig,
    ) -> Self {
        Self {
            store,
            users,
            plugins,
            ctx: ResolutionContext::new(),
            config,
            progress: Arc::new(Progress::new()),
            cycle: Mutex::new(()),
        }
    }

    /// Plugins implied by the configuration: the no-op plugin for everything
    /// when `noop` is set, nothing otherwise
    pub fn registry_for(config: &EnforcerConfig) -> PluginRegistry {
        if config.noop {
            PluginRegistry::noop(config.noop_sleep())
        } else {
            PluginRegistry::new()
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn config(&self) -> &EnforcerConfig {
        &self.config
    }

    /// Progress of the running (or last) apply
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Resolve the latest policy and diff it against the actual state
    pub fn preview(&self) -> Result<PlanPreview> {
        let (policy, policy_generation) = self.store.policy(None)?;
        self.preview_policy(&policy, policy_generation)
    }

    /// Resolve `policy`, which need not be stored, and diff it against the
    /// actual state
    pub fn preview_policy(&self, policy: &Policy, policy_generation: u64) -> Result<PlanPreview> {
        let users = self.users.load_all()?;
        let Resolution {
            state: desired,
            log: resolve_log,
        } = resolve(policy, &users, &self.ctx);
        let actual = self.store.actual_state()?;
        let plan = diff(&desired, &actual);
        tracing::debug!(
            policy_generation,
            desired = desired.len(),
            actual = actual.len(),
            actions = plan.len(),
            "Computed plan"
        );
        Ok(PlanPreview {
            policy_generation,
            desired,
            actual,
            plan,
            resolve_log,
        })
    }

    /// Run one reconciliation cycle.
    ///
    /// A cycle is skipped when the plan is empty and the last revision already
    /// covers the current policy generation.
    pub async fn enforce_once(&self) -> Result<CycleReport> {
        let _cycle = self.cycle.lock().await;
        self.reset_interrupted()?;

        let preview = self.preview()?;
        let covered = self
            .store
            .last_revision()?
            .is_some_and(|r| r.policy_generation == preview.policy_generation);
        if preview.plan.is_empty() && covered {
            tracing::debug!(policy_generation = preview.policy_generation, "Nothing to enforce");
            return Ok(CycleReport {
                policy_generation: preview.policy_generation,
                plan: preview.plan,
                revision: None,
                outcomes: BTreeMap::new(),
            });
        }

        let mut revision = self.store.create_revision(preview.policy_generation)?;
        revision.resolve_log = preview.resolve_log.clone();
        revision.start(u32::try_from(preview.plan.len()).unwrap_or(u32::MAX));
        self.store.save_revision(&revision)?;
        tracing::info!(
            revision = revision.generation,
            policy_generation = preview.policy_generation,
            actions = preview.plan.len(),
            "Enforcing policy"
        );

        match self.apply(&mut revision, &preview).await {
            Ok(outcomes) => Ok(CycleReport {
                policy_generation: preview.policy_generation,
                plan: preview.plan,
                revision: Some(revision),
                outcomes,
            }),
            Err(e) => {
                tracing::error!(revision = revision.generation, error = %e, "Revision failed");
                revision.fail(e.to_string());
                self.store.save_revision(&revision)?;
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        revision: &mut Revision,
        preview: &PlanPreview,
    ) -> Result<BTreeMap<ComponentInstanceKey, StepOutcome>> {
        let engine = ApplyEngine::new(self.plugins.clone(), self.config.max_concurrent_actions)
            .with_progress(self.progress.clone());
        let result = engine
            .apply(&preview.plan, &preview.desired, preview.actual.clone())
            .await;

        self.store.save_actual_state(&result.actual)?;
        revision.complete(result.tally, result.log);
        self.store.save_revision(revision)?;
        tracing::info!(revision = revision.generation, tally = %revision.tally, "Revision completed");
        Ok(result.outcomes)
    }

    /// Mark revisions left in progress by an interrupted cycle as failed
    fn reset_interrupted(&self) -> Result<()> {
        for mut revision in self.store.revisions()? {
            if revision.status != RevisionStatus::InProgress {
                continue;
            }
            tracing::warn!(revision = revision.generation, "Resetting interrupted revision");
            revision.fail("interrupted before completion");
            self.store.save_revision(&revision)?;
        }
        Ok(())
    }

    /// Enforce on a timer and whenever `trigger` is notified, until
    /// `shutdown` turns true or its sender goes away
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>, trigger: Arc<Notify>) {
        if self.config.disabled {
            tracing::info!("Enforcer disabled");
            return;
        }
        tracing::info!(interval = ?self.config.interval(), "Enforcer started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = self.enforce_once().await {
                tracing::error!(error = %e, "Enforcement cycle failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval()) => {}
                _ = trigger.notified() => {
                    tracing::debug!("Enforcement triggered");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Enforcer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, PolicyStore, PolicyUpdate, RevisionStore};
    use orchard_lang::{StaticUserLoader, User};
    use orchard_test_utils::scenario::{database_policy, db_claim, scenario_users};
    use std::time::Duration;

    fn enforcer(store: Arc<MemoryStore>) -> Enforcer {
        let users = StaticUserLoader::new(scenario_users());
        Enforcer::new(
            store,
            Arc::new(users),
            PluginRegistry::noop(Duration::ZERO),
            EnforcerConfig::default(),
        )
    }

    fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let admin = User {
            domain_admin: true,
            ..User::new("root")
        };
        let builder = db_claim(database_policy(), "c1", "alice", &[("team", "red")]);
        store
            .update_policy(&admin, PolicyUpdate::add(builder.objects().to_vec()))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_disabled_enforcer_returns_immediately() {
        let store = seeded();
        let mut enforcer = enforcer(store.clone());
        enforcer.config.disabled = true;
        let (_tx, rx) = watch::channel(false);
        enforcer.run(rx, Arc::new(Notify::new())).await;
        assert!(store.revisions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = seeded();
        let enforcer = Arc::new(enforcer(store.clone()));
        let (tx, rx) = watch::channel(false);
        let trigger = Arc::new(Notify::new());

        let handle = tokio::spawn({
            let enforcer = enforcer.clone();
            let trigger = trigger.clone();
            async move { enforcer.run(rx, trigger).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.revisions().unwrap().len(), 1);
        assert_eq!(enforcer.progress().percentage(), 100);
    }
}
