//! Load summary and reporting
//!
//! This module defines the per-table [`LoadSummary`], the cross-table
//! [`RunReport`] and the process exit codes derived from them.

use crate::core::progress::ProgressState;
use crate::core::verification::Verdict;
use crate::domain::SurgeError;
use std::time::Duration;

/// Process exit codes
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    /// Failed batches or a validation mismatch
    pub const PARTIAL_FAILURE: i32 = 1;
    pub const CONFIGURATION: i32 = 2;
    pub const CONNECTION: i32 = 4;
    pub const FATAL: i32 = 5;
    pub const INTERRUPTED: i32 = 130;
}

/// Min/avg/max of per-batch load time
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchTimings {
    pub min: Duration,
    pub avg: Duration,
    pub max: Duration,
}

impl BatchTimings {
    pub fn from_durations(durations: &[Duration]) -> Option<Self> {
        let min = *durations.iter().min()?;
        let max = *durations.iter().max()?;
        let total: Duration = durations.iter().sum();
        let avg = total / durations.len() as u32;
        Some(Self { min, avg, max })
    }
}

/// Summary of one table's load
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub table: String,

    /// Records the source produced (or was counted to hold)
    pub total_expected: Option<u64>,

    pub records_loaded: u64,

    pub batches_total: u64,
    pub batches_succeeded: u64,
    pub batches_failed: u64,

    /// Sequences of batches that failed terminally, ascending
    pub failed_batches: Vec<u64>,

    pub timings: Option<BatchTimings>,

    pub duration: Duration,

    /// Post-load validation result; `None` when validation did not run
    pub verdict: Option<Verdict>,

    /// Stopped early by a shutdown signal
    pub interrupted: bool,

    pub dry_run: bool,

    pub errors: Vec<LoadError>,
}

impl LoadSummary {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            total_expected: None,
            records_loaded: 0,
            batches_total: 0,
            batches_succeeded: 0,
            batches_failed: 0,
            failed_batches: Vec::new(),
            timings: None,
            duration: Duration::ZERO,
            verdict: None,
            interrupted: false,
            dry_run: false,
            errors: Vec::new(),
        }
    }

    /// Copy counters from the final progress state
    pub fn with_progress(mut self, state: &ProgressState) -> Self {
        self.total_expected = state.total_expected;
        self.records_loaded = state.records_loaded;
        self.batches_succeeded = state.batches_succeeded;
        self.batches_failed = state.batches_failed;
        self.batches_total = state.batches_finished();
        self.failed_batches = state.failed_batches.clone();
        self.failed_batches.sort_unstable();
        self.timings = BatchTimings::from_durations(&state.batch_timings);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn add_error(&mut self, error: LoadError) {
        self.errors.push(error);
    }

    /// Every batch loaded, validation passed and nothing else went wrong
    pub fn is_successful(&self) -> bool {
        self.batches_failed == 0
            && self.errors.is_empty()
            && !self.interrupted
            && !matches!(self.verdict, Some(Verdict::Mismatch { .. }))
    }

    /// Loaded records as a percentage of the expected total
    pub fn success_rate(&self) -> f64 {
        match self.total_expected {
            Some(0) | None => 100.0,
            Some(total) => self.records_loaded as f64 / total as f64 * 100.0,
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            exit_code::INTERRUPTED
        } else if self.is_successful() {
            exit_code::SUCCESS
        } else {
            exit_code::PARTIAL_FAILURE
        }
    }

    pub fn log_summary(&self) {
        let (min_ms, avg_ms, max_ms) = self
            .timings
            .map(|t| {
                (
                    t.min.as_millis() as u64,
                    t.avg.as_millis() as u64,
                    t.max.as_millis() as u64,
                )
            })
            .unwrap_or_default();

        tracing::info!(
            table = %self.table,
            total_expected = self.total_expected,
            records_loaded = self.records_loaded,
            batches = self.batches_total,
            batches_failed = self.batches_failed,
            batch_ms_min = min_ms,
            batch_ms_avg = avg_ms,
            batch_ms_max = max_ms,
            duration_secs = self.duration.as_secs_f64(),
            success_rate = format!("{:.2}%", self.success_rate()),
            verdict = ?self.verdict,
            interrupted = self.interrupted,
            dry_run = self.dry_run,
            "Load completed"
        );

        if !self.failed_batches.is_empty() {
            tracing::warn!(
                table = %self.table,
                failed_batches = ?self.failed_batches,
                "Some batches were not loaded"
            );
        }

        for error in &self.errors {
            tracing::warn!(
                table = %self.table,
                error_type = ?error.error_type,
                message = %error.message,
                context = error.context.as_deref().unwrap_or(""),
                "Load error"
            );
        }
    }
}

/// Kind of problem recorded in a summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadErrorType {
    /// Source failed after loading had started
    Source,
    /// The post-load count query failed
    Validation,
    /// A batch could not be handed to the workers
    Dispatch,
}

#[derive(Debug, Clone)]
pub struct LoadError {
    pub error_type: LoadErrorType,
    pub message: String,
    pub context: Option<String>,
}

impl LoadError {
    pub fn new(error_type: LoadErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// A table whose run aborted before dispatching any batch
#[derive(Debug, Clone)]
pub struct TableFailure {
    pub table: String,
    pub message: String,
    pub exit_code: i32,
}

impl TableFailure {
    pub fn from_error(table: impl Into<String>, error: &SurgeError) -> Self {
        let exit_code = match error {
            SurgeError::Configuration(_) | SurgeError::Source(_) => exit_code::CONFIGURATION,
            SurgeError::Sink(_) | SurgeError::PoolUnavailable(_) => exit_code::CONNECTION,
            _ => exit_code::FATAL,
        };
        Self {
            table: table.into(),
            message: error.to_string(),
            exit_code,
        }
    }
}

/// Results of every table in one run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub summaries: Vec<LoadSummary>,
    pub failures: Vec<TableFailure>,
}

impl RunReport {
    pub fn is_successful(&self) -> bool {
        self.failures.is_empty() && self.summaries.iter().all(LoadSummary::is_successful)
    }

    pub fn records_loaded(&self) -> u64 {
        self.summaries.iter().map(|s| s.records_loaded).sum()
    }

    /// Aggregate exit code
    ///
    /// Interruption wins, then the most severe table-level failure, then
    /// partial failure of any table.
    pub fn exit_code(&self) -> i32 {
        if self.summaries.iter().any(|s| s.interrupted) {
            return exit_code::INTERRUPTED;
        }
        if let Some(code) = self.failures.iter().map(|f| f.exit_code).max() {
            return code;
        }
        if self.is_successful() {
            exit_code::SUCCESS
        } else {
            exit_code::PARTIAL_FAILURE
        }
    }

    pub fn log_summary(&self) {
        for summary in &self.summaries {
            summary.log_summary();
        }
        for failure in &self.failures {
            tracing::error!(
                table = %failure.table,
                error = %failure.message,
                "Table load aborted"
            );
        }
        tracing::info!(
            tables = self.summaries.len() + self.failures.len(),
            aborted = self.failures.len(),
            records_loaded = self.records_loaded(),
            exit_code = self.exit_code(),
            "Run completed"
        );
    }
}
