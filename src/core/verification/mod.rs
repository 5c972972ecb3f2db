//! Post-load validation of persisted row counts

pub mod report;
pub mod validator;

pub use report::{ValidationReport, Verdict};
pub use validator::Validator;
