//! Post-load validation
//!
//! Counts the rows persisted in the target table once every batch has
//! finished and compares them with the expected total. A mismatch is
//! reported, never raised as an error.

use super::report::ValidationReport;
use crate::adapters::database::Sink;
use crate::core::load::ResourcePool;
use crate::domain::ids::TableName;
use crate::domain::Result;
use std::sync::Arc;
use std::time::Instant;

pub struct Validator<S: Sink> {
    sink: Arc<S>,
    pool: ResourcePool<S>,
}

impl<S: Sink> Validator<S> {
    pub fn new(sink: Arc<S>, pool: ResourcePool<S>) -> Self {
        Self { sink, pool }
    }

    /// Compare the row count of `table` against `total_expected`
    ///
    /// # Errors
    ///
    /// Returns an error only when the count query itself fails.
    pub async fn validate(&self, table: &TableName, total_expected: u64) -> Result<ValidationReport> {
        let start = Instant::now();
        let mut conn = self.pool.acquire().await?;
        let actual = self.sink.count_rows(&mut conn, table).await?;
        let report = ValidationReport::new(
            table.as_str(),
            actual,
            total_expected,
            start.elapsed().as_millis() as u64,
        );

        if report.is_success() {
            tracing::info!(
                table = %table,
                rows = actual,
                "Validation passed"
            );
        } else {
            tracing::warn!(
                table = %table,
                actual = actual,
                expected = total_expected,
                "Validation mismatch: row count differs from expected total"
            );
        }
        Ok(report)
    }
}
