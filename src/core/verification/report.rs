//! Validation report structures

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of comparing persisted rows with the expected total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Mismatch { actual: u64, expected: u64 },
}

impl Verdict {
    pub fn compare(actual: u64, expected: u64) -> Self {
        if actual == expected {
            Verdict::Pass
        } else {
            Verdict::Mismatch { actual, expected }
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Post-load validation result for one table
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// When the count query ran
    pub validated_at: DateTime<Utc>,

    pub table: String,

    pub expected: u64,

    /// Rows counted in the table
    pub actual: u64,

    pub verdict: Verdict,

    /// Duration of the count query in milliseconds
    pub duration_ms: u64,
}

impl ValidationReport {
    pub fn new(table: impl Into<String>, actual: u64, expected: u64, duration_ms: u64) -> Self {
        Self {
            validated_at: Utc::now(),
            table: table.into(),
            expected,
            actual,
            verdict: Verdict::compare(actual, expected),
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.verdict.is_pass()
    }

    /// Format the report as a human-readable string
    pub fn format_summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str(&format!("Validation of {}\n", self.table));
        summary.push_str(&format!("  Validated at: {}\n", self.validated_at));
        summary.push_str(&format!("  Expected rows: {}\n", self.expected));
        summary.push_str(&format!("  Actual rows: {}\n", self.actual));
        match self.verdict {
            Verdict::Pass => summary.push_str("  Result: PASS\n"),
            Verdict::Mismatch { actual, expected } => summary.push_str(&format!(
                "  Result: MISMATCH ({} rows {})\n",
                actual.abs_diff(expected),
                if actual > expected { "extra" } else { "missing" }
            )),
        }
        summary
    }
}
