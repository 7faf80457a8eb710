//! Running action counters

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Counts of actions by outcome, updated as the apply runs
#[derive(Debug, Default)]
pub struct Tally {
    total: AtomicU32,
    success: AtomicU32,
    failed: AtomicU32,
    skipped: AtomicU32,
}

impl Tally {
    pub fn new(total: u32) -> Self {
        Self {
            total: AtomicU32::new(total),
            ..Self::default()
        }
    }

    pub fn success(&self, n: u32) {
        self.success.fetch_add(n, Ordering::SeqCst);
    }

    pub fn failed(&self, n: u32) {
        self.failed.fetch_add(n, Ordering::SeqCst);
    }

    pub fn skipped(&self, n: u32) {
        self.skipped.fetch_add(n, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            total: self.total.load(Ordering::SeqCst),
            success: self.success.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time copy of a [`Tally`], stored on revisions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallySnapshot {
    pub total: u32,
    pub success: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl TallySnapshot {
    /// Actions with a recorded outcome
    pub fn done(&self) -> u32 {
        self.success + self.failed + self.skipped
    }

    /// Every action has exactly one outcome
    pub fn is_complete(&self) -> bool {
        self.done() == self.total
    }

    pub fn is_success(&self) -> bool {
        self.is_complete() && self.failed == 0 && self.skipped == 0
    }
}

impl std::fmt::Display for TallySnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} total, {} succeeded, {} failed, {} skipped",
            self.total, self.success, self.failed, self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_counts() {
        let tally = Tally::new(5);
        tally.success(3);
        tally.failed(1);
        assert!(!tally.snapshot().is_complete());
        tally.skipped(1);

        let snapshot = tally.snapshot();
        assert!(snapshot.is_complete());
        assert!(!snapshot.is_success());
        assert_eq!(snapshot.to_string(), "5 total, 3 succeeded, 1 failed, 1 skipped");
    }
}
