//! Live sweep progress shared with the status endpoint.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::rate::RatePoint;
use super::record::RunRecord;

/// Counters updated by the sweep loop and read by observers
#[derive(Debug)]
pub struct SweepProgress {
    total: usize,
    finished: AtomicUsize,
    failed: AtomicUsize,
    current_rate: Mutex<Option<RatePoint>>,
}

/// Point-in-time view of sweep progress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub total_runs: usize,
    pub finished_runs: usize,
    pub failed_runs: usize,
    pub current_rate: Option<RatePoint>,
}

impl SweepProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            finished: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            current_rate: Mutex::new(None),
        }
    }

    pub(crate) fn run_started(&self, rate: RatePoint) {
        if let Ok(mut current) = self.current_rate.lock() {
            *current = Some(rate);
        }
    }

    pub(crate) fn run_finished(&self, record: &RunRecord) {
        if !record.is_success() {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.finished.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut current) = self.current_rate.lock() {
            *current = None;
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total_runs: self.total,
            finished_runs: self.finished.load(Ordering::Relaxed),
            failed_runs: self.failed.load(Ordering::Relaxed),
            current_rate: self.current_rate.lock().ok().and_then(|c| *c),
        }
    }
}
