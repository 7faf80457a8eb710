//! Bounded, dependency ordered plan execution

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio::task::JoinError;

use super::plugin::{DeployPlugin, PluginParams};
use super::progress::{NoProgress, ProgressIndicator};
use super::registry::PluginRegistry;
use super::tally::{Tally, TallySnapshot};
use crate::diff::{Action, ActionPlan, PlanStep};
use crate::error::{Error, Result};
use crate::event::EventLog;
use crate::resolve::{ComponentInstance, ComponentInstanceKey, PolicyResolution};

/// Worker pool size when nothing else is configured
pub const DEFAULT_MAX_CONCURRENT_ACTIONS: usize = 8;

/// How a plan step ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepOutcome {
    Success,
    Failed { error: String },
    Skipped { reason: String },
}

/// Everything an apply run produced
#[derive(Debug, Clone)]
pub struct ApplyResult {
    /// Actual state after the run, including partial progress
    pub actual: PolicyResolution,
    pub tally: TallySnapshot,
    pub outcomes: BTreeMap<ComponentInstanceKey, StepOutcome>,
    pub log: EventLog,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.tally.is_success()
    }
}

/// State shared by the step tasks of one run
struct Shared {
    plugins: Arc<PluginRegistry>,
    desired: PolicyResolution,
    actual: Mutex<PolicyResolution>,
    tally: Tally,
    progress: Arc<dyn ProgressIndicator>,
}

type StepResult = std::result::Result<(), String>;

/// Executes action plans against deployment plugins.
///
/// Steps run as separate tasks, at most `max_concurrent` at a time, and a
/// step starts only after every step in its `after` set succeeded. The
/// actions of one step run in order; the first failure skips the rest of the
/// step and every step depending on it, directly or not. Failures and panics
/// are recorded and never abort the run.
pub struct ApplyEngine {
    plugins: Arc<PluginRegistry>,
    max_concurrent: usize,
    progress: Arc<dyn ProgressIndicator>,
}

impl ApplyEngine {
    pub fn new(plugins: PluginRegistry, max_concurrent: usize) -> Self {
        Self {
            plugins: Arc::new(plugins),
            max_concurrent: max_concurrent.max(1),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressIndicator>) -> Self {
        self.progress = progress;
        self
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Run `plan`, moving `actual` towards `desired`
    pub async fn apply(
        &self,
        plan: &ActionPlan,
        desired: &PolicyResolution,
        actual: PolicyResolution,
    ) -> ApplyResult {
        let mut log = EventLog::new("apply");
        let total = u32::try_from(plan.len()).unwrap_or(u32::MAX);
        self.progress.set_total(total);

        let shared = Arc::new(Shared {
            plugins: self.plugins.clone(),
            desired: desired.clone(),
            actual: Mutex::new(actual),
            tally: Tally::new(total),
            progress: self.progress.clone(),
        });
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        let steps = &plan.steps;
        let index: BTreeMap<&ComponentInstanceKey, usize> =
            steps.iter().enumerate().map(|(i, s)| (&s.key, i)).collect();
        let mut waiting = vec![0usize; steps.len()];
        let mut dependents = vec![Vec::new(); steps.len()];
        for (i, step) in steps.iter().enumerate() {
            for dep in &step.after {
                if let Some(&d) = index.get(dep) {
                    waiting[i] += 1;
                    dependents[d].push(i);
                }
            }
        }

        let mut outcomes: Vec<Option<StepOutcome>> = vec![None; steps.len()];
        let mut ready: Vec<usize> = (0..steps.len()).filter(|&i| waiting[i] == 0).collect();
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, StepResult)>();
        let mut in_flight = 0usize;

        tracing::info!(steps = steps.len(), actions = total, "Applying plan");
        loop {
            for i in ready.drain(..) {
                spawn_step(&shared, &semaphore, i, steps[i].clone(), tx.clone());
                in_flight += 1;
            }
            if in_flight == 0 {
                break;
            }
            let Some((i, result)) = rx.recv().await else {
                break;
            };
            in_flight -= 1;

            let key = steps[i].key.to_string();
            match result {
                Ok(()) => {
                    log.info(format!("applied {} action(s)", steps[i].actions.len()), &[key.as_str()]);
                    outcomes[i] = Some(StepOutcome::Success);
                    for &d in &dependents[i] {
                        waiting[d] -= 1;
                        if waiting[d] == 0 && outcomes[d].is_none() {
                            ready.push(d);
                        }
                    }
                }
                Err(error) => {
                    log.error(format!("step failed: {}", error), &[key.as_str()]);
                    outcomes[i] = Some(StepOutcome::Failed { error });
                    skip_dependents(i, steps, &dependents, &mut outcomes, &shared, &mut log);
                }
            }
        }

        for (i, step) in steps.iter().enumerate() {
            if outcomes[i].is_none() {
                let key = step.key.to_string();
                log.warn("step skipped: dependency cycle in plan", &[key.as_str()]);
                skip_step(step, &shared);
                outcomes[i] = Some(StepOutcome::Skipped {
                    reason: "dependency cycle in plan".to_string(),
                });
            }
        }

        self.progress.done();
        let tally = shared.tally.snapshot();
        if !tally.is_complete() {
            log.error(format!("action tally doesn't add up: {}", tally), &[]);
        }
        log.info(format!("apply finished: {}", tally), &[]);

        let actual = shared.actual.lock().await.clone();
        let outcomes = steps
            .iter()
            .zip(outcomes)
            .filter_map(|(step, outcome)| outcome.map(|o| (step.key.clone(), o)))
            .collect();

        ApplyResult {
            actual,
            tally,
            outcomes,
            log,
        }
    }
}

fn spawn_step(
    shared: &Arc<Shared>,
    semaphore: &Arc<Semaphore>,
    index: usize,
    step: PlanStep,
    tx: mpsc::UnboundedSender<(usize, StepResult)>,
) {
    let shared = shared.clone();
    let semaphore = semaphore.clone();
    tokio::spawn(async move {
        let len = u32::try_from(step.actions.len()).unwrap_or(u32::MAX);
        let _permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                shared.tally.failed(len);
                shared.progress.advance(len);
                let _ = tx.send((index, Err(e.to_string())));
                return;
            }
        };

        // The step runs in its own task so a panicking plugin only fails this step
        let processed = Arc::new(AtomicU32::new(0));
        let task = tokio::spawn(run_step(shared.clone(), step, processed.clone()));
        let result = match task.await {
            Ok(result) => result,
            Err(err) => {
                let remaining = len.saturating_sub(processed.load(Ordering::SeqCst));
                if remaining > 0 {
                    shared.tally.failed(1);
                    shared.tally.skipped(remaining - 1);
                    shared.progress.advance(remaining);
                }
                Err(panic_message(err))
            }
        };
        let _ = tx.send((index, result));
    });
}

async fn run_step(shared: Arc<Shared>, step: PlanStep, processed: Arc<AtomicU32>) -> StepResult {
    let len = u32::try_from(step.actions.len()).unwrap_or(u32::MAX);
    for (i, action) in step.actions.iter().enumerate() {
        tracing::debug!(action = %action, "Running action");
        match execute(&shared, action).await {
            Ok(()) => {
                shared.tally.success(1);
                shared.progress.advance(1);
                processed.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                let rest = len.saturating_sub(i as u32 + 1);
                shared.tally.failed(1);
                shared.tally.skipped(rest);
                shared.progress.advance(rest + 1);
                processed.store(len, Ordering::SeqCst);
                return Err(format!("{}: {}", action.name(), e));
            }
        }
    }
    Ok(())
}

async fn execute(shared: &Shared, action: &Action) -> Result<()> {
    let key = action.key();
    match action {
        Action::Create { .. } => {
            let want = desired_instance(shared, key)?;
            if want.is_code {
                plugin_for(shared, want)?
                    .create(&PluginParams::from_instance(want))
                    .await?;
            }
            let mut instance = want.clone();
            instance.claim_keys.clear();
            instance.endpoints.clear();
            instance.endpoints_updated_at = None;
            instance.endpoints_stale = want.is_code;
            let now = Utc::now();
            instance.created_at = Some(now);
            instance.updated_at = Some(now);
            shared
                .actual
                .lock()
                .await
                .copy_instance(&shared.desired, instance);
        }
        Action::Update { .. } => {
            let want = desired_instance(shared, key)?;
            if want.is_code {
                plugin_for(shared, want)?
                    .update(&PluginParams::from_instance(want))
                    .await?;
            }
            let mut actual = shared.actual.lock().await;
            let have = actual_instance(&mut actual, key)?;
            have.code_params = want.code_params.clone();
            have.discovery = want.discovery.clone();
            have.labels = want.labels.clone();
            have.plugin_data = want.plugin_data.clone();
            have.updated_at = Some(Utc::now());
            have.endpoints_stale = want.is_code;
        }
        Action::Delete { .. } => {
            let have = shared
                .actual
                .lock()
                .await
                .instance(key)
                .cloned()
                .ok_or_else(|| not_found(key))?;
            if have.is_code {
                plugin_for(shared, &have)?
                    .destroy(&PluginParams::from_instance(&have))
                    .await?;
            }
            shared.actual.lock().await.remove_instance(key);
        }
        Action::AttachClaim { claim, .. } => {
            let mut actual = shared.actual.lock().await;
            actual_instance(&mut actual, key)?
                .claim_keys
                .insert(claim.clone());
        }
        Action::DetachClaim { claim, .. } => {
            let mut actual = shared.actual.lock().await;
            actual_instance(&mut actual, key)?.claim_keys.remove(claim);
        }
        Action::RefreshEndpoints { .. } => {
            let want = desired_instance(shared, key)?;
            let endpoints = if want.is_code {
                plugin_for(shared, want)?
                    .endpoints(&PluginParams::from_instance(want))
                    .await?
            } else {
                BTreeMap::new()
            };
            let mut actual = shared.actual.lock().await;
            let have = actual_instance(&mut actual, key)?;
            have.endpoints = endpoints;
            have.endpoints_updated_at = Some(Utc::now());
            have.endpoints_stale = false;
        }
    }
    Ok(())
}

fn desired_instance<'a>(shared: &'a Shared, key: &ComponentInstanceKey) -> Result<&'a ComponentInstance> {
    shared.desired.instance(key).ok_or_else(|| not_found(key))
}

fn actual_instance<'a>(
    actual: &'a mut PolicyResolution,
    key: &ComponentInstanceKey,
) -> Result<&'a mut ComponentInstance> {
    actual.instance_mut(key).ok_or_else(|| not_found(key))
}

fn plugin_for(shared: &Shared, instance: &ComponentInstance) -> Result<Arc<dyn DeployPlugin>> {
    shared.plugins.get(&instance.cluster_type, &instance.code_type)
}

fn not_found(key: &ComponentInstanceKey) -> Error {
    Error::InstanceNotFound {
        key: key.to_string(),
    }
}

fn skip_step(step: &PlanStep, shared: &Shared) {
    let len = u32::try_from(step.actions.len()).unwrap_or(u32::MAX);
    shared.tally.skipped(len);
    shared.progress.advance(len);
}

/// Mark every transitive dependent of a failed step as skipped
fn skip_dependents(
    failed: usize,
    steps: &[PlanStep],
    dependents: &[Vec<usize>],
    outcomes: &mut [Option<StepOutcome>],
    shared: &Shared,
    log: &mut EventLog,
) {
    let reason = format!("depends on failed step {}", steps[failed].key);
    let mut stack = dependents[failed].clone();
    while let Some(i) = stack.pop() {
        if outcomes[i].is_some() {
            continue;
        }
        let key = steps[i].key.to_string();
        log.warn(format!("step skipped: {}", reason), &[key.as_str()]);
        skip_step(&steps[i], shared);
        outcomes[i] = Some(StepOutcome::Skipped {
            reason: reason.clone(),
        });
        stack.extend(dependents[i].iter().copied());
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("action panicked: {}", message)
}
