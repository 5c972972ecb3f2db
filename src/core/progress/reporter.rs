//! Progress reporters
//!
//! A reporter is told about every finished batch. The log reporter emits a
//! structured event; the bar reporter drives an `indicatif` bar, or a spinner
//! until the total is known.

use super::tracker::{ProgressState, ProgressUpdate};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

/// Receives progress callbacks from a [`super::ProgressTracker`]
pub trait ProgressReporter: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);

    /// The total became known after the load started
    fn on_total(&self, _total: u64) {}

    fn on_finish(&self, _state: &ProgressState) {}
}

/// Reports progress as `info` events
#[derive(Debug, Clone)]
pub struct LogProgressReporter {
    table: String,
}

impl LogProgressReporter {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

impl ProgressReporter for LogProgressReporter {
    fn on_progress(&self, update: &ProgressUpdate) {
        match update.percent_complete {
            Some(percent) => tracing::info!(
                table = %self.table,
                batch = update.sequence,
                records_loaded = update.records_loaded,
                total_expected = update.total_expected,
                percent = format!("{percent:.1}%"),
                "Load progress"
            ),
            None => tracing::info!(
                table = %self.table,
                batch = update.sequence,
                records_loaded = update.records_loaded,
                "Load progress (total not yet known)"
            ),
        }
    }

    fn on_finish(&self, state: &ProgressState) {
        tracing::debug!(
            table = %self.table,
            records_loaded = state.records_loaded,
            batches = state.batches_finished(),
            "Progress reporting finished"
        );
    }
}

const BAR_TEMPLATE: &str =
    "{msg:<20} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({percent}%, {eta})";
const SPINNER_TEMPLATE: &str = "{msg:<20} {spinner:.green} [{elapsed_precise}] {pos} records";

/// Terminal progress bar for one table
pub struct BarProgressReporter {
    bar: ProgressBar,
}

impl BarProgressReporter {
    /// Create a bar, attached to `multi` when several tables load together
    pub fn new(table: &str, total: Option<u64>, multi: Option<&MultiProgress>) -> Self {
        let bar = match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(bar_style());
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::with_template(SPINNER_TEMPLATE) {
                    bar.set_style(style);
                }
                bar.enable_steady_tick(Duration::from_millis(120));
                bar
            }
        };
        let bar = match multi {
            Some(multi) => multi.add(bar),
            None => bar,
        };
        bar.set_message(table.to_string());
        Self { bar }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

impl ProgressReporter for BarProgressReporter {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.bar.set_position(update.records_loaded);
        if !update.batch_succeeded {
            self.bar
                .println(format!("batch {} failed", update.sequence));
        }
    }

    fn on_total(&self, total: u64) {
        self.bar.disable_steady_tick();
        self.bar.set_style(bar_style());
        self.bar.set_length(total);
    }

    fn on_finish(&self, state: &ProgressState) {
        if state.batches_failed == 0 {
            self.bar.finish_with_message(format!("{} ✓", self.bar.message()));
        } else {
            self.bar.abandon_with_message(format!(
                "{} ({} failed batches)",
                self.bar.message(),
                state.batches_failed
            ));
        }
    }
}

/// How a run reports progress for each of its tables
#[derive(Clone)]
pub enum ProgressMode {
    Log,
    Bar(MultiProgress),
}

impl ProgressMode {
    pub fn bars() -> Self {
        ProgressMode::Bar(MultiProgress::new())
    }

    pub fn reporter(&self, table: &str, total: Option<u64>) -> Arc<dyn ProgressReporter> {
        match self {
            ProgressMode::Log => Arc::new(LogProgressReporter::new(table)),
            ProgressMode::Bar(multi) => Arc::new(BarProgressReporter::new(table, total, Some(multi))),
        }
    }
}
