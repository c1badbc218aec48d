//! Per-cycle outcome counters
//!
//! Counters are plain atomics with relaxed ordering. A snapshot taken while
//! workers are still running may be a few increments behind; the run log is
//! the authoritative record.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{Outcome, Status};

/// Outcome counters for one cycle
#[derive(Debug, Default)]
pub struct CycleAggregator {
    success: AtomicU64,
    failure: AtomicU64,
    error: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleCounts {
    pub success: u64,
    pub failure: u64,
    pub error: u64,
}

impl CycleCounts {
    pub fn status(&self) -> Status {
        Status::from_counts(self.success, self.failure, self.error)
    }

    pub fn total(&self) -> u64 {
        self.success + self.failure + self.error
    }
}

impl CycleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failure(&self) {
        self.failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_error(&self) {
        self.error.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one classified outcome
    pub fn record(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Success => self.increment_success(),
            Outcome::Failure(_) => self.increment_failure(),
            Outcome::Error(_) => self.increment_error(),
        }
    }

    /// Zero every counter
    pub fn reset(&self) {
        self.success.store(0, Ordering::Relaxed);
        self.failure.store(0, Ordering::Relaxed);
        self.error.store(0, Ordering::Relaxed);
    }

    pub fn counts(&self) -> CycleCounts {
        CycleCounts {
            success: self.success.load(Ordering::Relaxed),
            failure: self.failure.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
        }
    }

    pub fn status(&self) -> Status {
        self.counts().status()
    }
}
