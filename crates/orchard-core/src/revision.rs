//! Revisions: one record per reconciliation cycle that had work to do

use std::fmt;

use chrono::{DateTime, Utc};
use orchard_engine::apply::{ProgressSnapshot, TallySnapshot};
use orchard_engine::EventLog;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevisionStatus {
    Waiting,
    InProgress,
    Completed,
    Error,
}

impl fmt::Display for RevisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RevisionStatus::Waiting => "waiting",
            RevisionStatus::InProgress => "in-progress",
            RevisionStatus::Completed => "completed",
            RevisionStatus::Error => "error",
        })
    }
}

/// Record of applying one policy generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// Sequence number, starting at 1
    pub generation: u64,
    pub policy_generation: u64,
    /// Identifies the enforcer cycle that created the revision
    pub run_id: Uuid,
    pub status: RevisionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub tally: TallySnapshot,
    #[serde(default)]
    pub progress: ProgressSnapshot,
    #[serde(default)]
    pub resolve_log: EventLog,
    #[serde(default)]
    pub apply_log: EventLog,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Revision {
    pub fn new(generation: u64, policy_generation: u64) -> Self {
        Self {
            generation,
            policy_generation,
            run_id: Uuid::new_v4(),
            status: RevisionStatus::Waiting,
            error: None,
            tally: TallySnapshot::default(),
            progress: ProgressSnapshot::default(),
            resolve_log: EventLog::new("resolve"),
            apply_log: EventLog::new("apply"),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self, total: u32) {
        self.status = RevisionStatus::InProgress;
        self.started_at = Some(Utc::now());
        self.progress = ProgressSnapshot { current: 0, total };
        self.tally.total = total;
    }

    pub fn complete(&mut self, tally: TallySnapshot, apply_log: EventLog) {
        self.status = RevisionStatus::Completed;
        self.progress = ProgressSnapshot {
            current: tally.done(),
            total: tally.total,
        };
        self.tally = tally;
        self.apply_log = apply_log;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RevisionStatus::Error;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, RevisionStatus::Completed | RevisionStatus::Error)
    }
}
