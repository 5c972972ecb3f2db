//! Load progress tracking and reporting

pub mod reporter;
pub mod tracker;

pub use reporter::{BarProgressReporter, LogProgressReporter, ProgressMode, ProgressReporter};
pub use tracker::{ProgressState, ProgressTracker, ProgressUpdate};
