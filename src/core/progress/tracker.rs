//! Progress and metrics aggregation
//!
//! Workers report each finished batch to a shared [`ProgressTracker`]. All
//! mutation goes through one lock, so `records_loaded` only grows and a
//! reporter sees updates one at a time.

use super::reporter::ProgressReporter;
use crate::core::load::LoadOutcome;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Aggregated progress of one table's load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressState {
    pub records_loaded: u64,
    /// Set once; `None` until the total is known
    pub total_expected: Option<u64>,
    pub batches_succeeded: u64,
    pub batches_failed: u64,
    /// Records in batches that failed terminally
    pub records_failed: u64,
    pub failed_batches: Vec<u64>,
    /// Elapsed time of every finished batch
    pub batch_timings: Vec<Duration>,
}

impl ProgressState {
    /// `records_loaded / total_expected` as a percentage, when the total is known
    pub fn percent_complete(&self) -> Option<f64> {
        match self.total_expected {
            Some(0) => Some(100.0),
            Some(total) => Some(self.records_loaded as f64 / total as f64 * 100.0),
            None => None,
        }
    }

    pub fn batches_finished(&self) -> u64 {
        self.batches_succeeded + self.batches_failed
    }
}

/// What a reporter receives after each batch
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub sequence: u64,
    pub batch_succeeded: bool,
    pub records_loaded: u64,
    pub total_expected: Option<u64>,
    pub percent_complete: Option<f64>,
}

/// Thread-safe progress aggregator
pub struct ProgressTracker {
    state: Mutex<ProgressState>,
    reporter: Arc<dyn ProgressReporter>,
}

impl ProgressTracker {
    pub fn new(total_expected: Option<u64>, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            state: Mutex::new(ProgressState {
                total_expected,
                ..ProgressState::default()
            }),
            reporter,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fold one batch outcome into the totals and notify the reporter
    pub fn record(&self, outcome: &LoadOutcome) {
        let mut state = self.lock();
        state.records_loaded += outcome.records_loaded;
        state.batch_timings.push(outcome.elapsed);
        if outcome.is_success() {
            state.batches_succeeded += 1;
        } else {
            state.batches_failed += 1;
            state.records_failed += outcome.records;
            state.failed_batches.push(outcome.sequence);
        }

        let update = ProgressUpdate {
            sequence: outcome.sequence,
            batch_succeeded: outcome.is_success(),
            records_loaded: state.records_loaded,
            total_expected: state.total_expected,
            percent_complete: state.percent_complete(),
        };
        // Called under the lock so updates arrive in order
        self.reporter.on_progress(&update);
    }

    /// Set the total once it becomes known
    ///
    /// Returns `false` and leaves the state untouched if a total was already
    /// set.
    pub fn set_total(&self, total: u64) -> bool {
        let mut state = self.lock();
        if state.total_expected.is_some() {
            return false;
        }
        state.total_expected = Some(total);
        self.reporter.on_total(total);
        true
    }

    pub fn total_expected(&self) -> Option<u64> {
        self.lock().total_expected
    }

    pub fn snapshot(&self) -> ProgressState {
        self.lock().clone()
    }

    /// Final notification to the reporter
    pub fn finish(&self) -> ProgressState {
        let state = self.lock();
        self.reporter.on_finish(&state);
        state.clone()
    }
}
