//! Progress reporting for long running applies

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Receives progress updates from the apply engine
pub trait ProgressIndicator: Send + Sync {
    fn set_total(&self, total: u32);

    /// Mark `n` more actions as finished
    fn advance(&self, n: u32);

    fn done(&self);
}

/// Progress counter readable from other tasks
#[derive(Debug, Default)]
pub struct Progress {
    current: AtomicU32,
    total: AtomicU32,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            current: self.current.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
        }
    }
}

impl ProgressIndicator for Progress {
    fn set_total(&self, total: u32) {
        self.total.store(total, Ordering::SeqCst);
        self.current.store(0, Ordering::SeqCst);
    }

    fn advance(&self, n: u32) {
        self.current.fetch_add(n, Ordering::SeqCst);
    }

    fn done(&self) {
        self.current
            .store(self.total.load(Ordering::SeqCst), Ordering::SeqCst);
    }
}

/// Discards all updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressIndicator for NoProgress {
    fn set_total(&self, _total: u32) {}
    fn advance(&self, _n: u32) {}
    fn done(&self) {}
}

/// Progress as stored on a revision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub current: u32,
    pub total: u32,
}

impl ProgressSnapshot {
    /// Whole percent done, rounded down and capped at 100.
    /// An empty run counts as finished.
    pub fn percentage(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        let pct = u64::from(self.current) * 100 / u64::from(self.total);
        pct.min(100) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, 100)]
    #[case(0, 3, 0)]
    #[case(1, 3, 33)]
    #[case(2, 3, 66)]
    #[case(3, 3, 100)]
    #[case(5, 3, 100)]
    fn test_percentage(#[case] current: u32, #[case] total: u32, #[case] expected: u32) {
        assert_eq!(ProgressSnapshot { current, total }.percentage(), expected);
    }

    #[test]
    fn test_progress_advances_and_completes() {
        let progress = Progress::new();
        progress.set_total(4);
        progress.advance(1);
        assert_eq!(progress.snapshot(), ProgressSnapshot { current: 1, total: 4 });
        progress.done();
        assert_eq!(progress.snapshot().percentage(), 100);
    }
}
