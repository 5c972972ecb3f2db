//! Batch loader
//!
//! Loads one batch as a single sink transaction. Failed attempts are rolled
//! back and retried with exponential backoff; once the retry budget is spent
//! the batch fails terminally and exactly one alert is sent.
//!
//! Each batch walks an explicit state machine:
//!
//! ```text
//! Pending -> Attempting(0) -> Succeeded
//!                 |
//!                 +-> Attempting(1) -> ... -> Attempting(max_retries) -> TerminalFailure
//! ```

use super::pool::{PooledConnection, ResourcePool};
use crate::adapters::alert::AlertDispatcher;
use crate::adapters::database::Sink;
use crate::domain::ids::{ColumnName, TableName};
use crate::domain::record::{Batch, Record};
use crate::domain::SurgeError;
use std::sync::Arc;
use std::time::{Duration, Instant};

const PREVIEW_CHARS: usize = 200;

/// Retry budget and backoff for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base unit of the exponential backoff
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_unit: Duration) -> Self {
        Self {
            max_retries,
            backoff_unit,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Wait before retry number `retry` (1-based): `2^retry` units
    pub fn backoff(&self, retry: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Where a batch is in its load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    /// Attempt in progress after this many retries
    Attempting(u32),
    /// Committed with this many rows
    Succeeded(u64),
    TerminalFailure,
}

/// Why a batch was given up on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Every attempt failed
    RetriesExhausted,
    /// No connection could be obtained
    PoolUnavailable,
    /// The error is not one a retry can fix
    NonRetryable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub kind: FailureKind,
    pub error: String,
}

/// Result of loading one batch
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub sequence: u64,
    /// Records in the batch
    pub records: u64,
    /// Records committed; zero on failure
    pub records_loaded: u64,
    pub attempts: u32,
    pub elapsed: Duration,
    pub failure: Option<BatchFailure>,
}

impl LoadOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

struct AttemptFailure {
    error: SurgeError,
    /// The transaction was rolled back and the connection can be reused
    rolled_back: bool,
}

/// Loads batches into one table
pub struct BatchLoader<S: Sink> {
    sink: Arc<S>,
    pool: ResourcePool<S>,
    table: TableName,
    columns: Vec<ColumnName>,
    retry: RetryPolicy,
    alerts: AlertDispatcher,
}

impl<S: Sink> BatchLoader<S> {
    pub fn new(
        sink: Arc<S>,
        pool: ResourcePool<S>,
        table: TableName,
        columns: Vec<ColumnName>,
        retry: RetryPolicy,
        alerts: AlertDispatcher,
    ) -> Self {
        Self {
            sink,
            pool,
            table,
            columns,
            retry,
            alerts,
        }
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Load `batch`, retrying as the policy allows
    ///
    /// Never returns an error: failures are reported in the outcome, and a
    /// terminal failure has already been alerted when this returns.
    pub async fn load(&self, batch: Batch) -> LoadOutcome {
        let started = Instant::now();
        let mut slot: Option<PooledConnection<S>> = None;
        let mut attempts = 0u32;
        let mut failure: Option<BatchFailure> = None;
        let mut state = LoadState::Pending;

        let loaded = loop {
            state = match state {
                LoadState::Pending => LoadState::Attempting(0),
                LoadState::Attempting(retries) => {
                    let mut conn = match slot.take() {
                        Some(conn) => conn,
                        None => match self.pool.acquire().await {
                            Ok(conn) => conn,
                            Err(e) => {
                                failure = Some(BatchFailure {
                                    kind: FailureKind::PoolUnavailable,
                                    error: e.to_string(),
                                });
                                state = LoadState::TerminalFailure;
                                continue;
                            }
                        },
                    };

                    attempts += 1;
                    match self.attempt(&mut conn, &batch.records).await {
                        Ok(rows) => {
                            slot = Some(conn);
                            LoadState::Succeeded(rows)
                        }
                        Err(AttemptFailure { error, rolled_back }) => {
                            if rolled_back {
                                slot = Some(conn);
                            } else {
                                tracing::warn!(
                                    table = %self.table,
                                    batch = batch.sequence,
                                    "Rollback failed; discarding connection"
                                );
                                self.pool.discard(conn);
                            }
                            self.after_failure(&batch, retries, error, &mut failure)
                                .await
                        }
                    }
                }
                LoadState::Succeeded(rows) => break rows,
                LoadState::TerminalFailure => break 0,
            };
        };
        drop(slot);

        let outcome = LoadOutcome {
            sequence: batch.sequence,
            records: batch.len() as u64,
            records_loaded: loaded,
            attempts,
            elapsed: started.elapsed(),
            failure,
        };

        match &outcome.failure {
            None => tracing::debug!(
                table = %self.table,
                batch = outcome.sequence,
                records = outcome.records_loaded,
                attempts = outcome.attempts,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "Batch loaded"
            ),
            Some(failure) => {
                tracing::error!(
                    table = %self.table,
                    batch = outcome.sequence,
                    records = outcome.records,
                    attempts = outcome.attempts,
                    kind = ?failure.kind,
                    error = %failure.error,
                    "Batch failed"
                );
                self.alert(&batch, &outcome, failure).await;
            }
        }
        outcome
    }

    /// Decide the next state after a failed attempt, sleeping before a retry
    async fn after_failure(
        &self,
        batch: &Batch,
        retries: u32,
        error: SurgeError,
        failure: &mut Option<BatchFailure>,
    ) -> LoadState {
        if !error.is_retryable() {
            *failure = Some(BatchFailure {
                kind: FailureKind::NonRetryable,
                error: error.to_string(),
            });
            return LoadState::TerminalFailure;
        }

        let retry = retries + 1;
        if retry > self.retry.max_retries {
            *failure = Some(BatchFailure {
                kind: FailureKind::RetriesExhausted,
                error: error.to_string(),
            });
            return LoadState::TerminalFailure;
        }

        let delay = self.retry.backoff(retry);
        let transient = matches!(&error, SurgeError::Sink(e) if e.is_transient());
        tracing::warn!(
            table = %self.table,
            batch = batch.sequence,
            retry = retry,
            max_retries = self.retry.max_retries,
            delay_ms = delay.as_millis() as u64,
            transient = transient,
            error = %error,
            "Batch attempt failed, retrying after backoff"
        );
        tokio::time::sleep(delay).await;
        LoadState::Attempting(retry)
    }

    /// One transactional attempt
    async fn attempt(
        &self,
        conn: &mut S::Connection,
        records: &[Record],
    ) -> std::result::Result<u64, AttemptFailure> {
        match self.insert_all(conn, records).await {
            Ok(rows) => Ok(rows),
            Err(error) => {
                let rolled_back = match self.sink.rollback(conn).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(table = %self.table, error = %e, "Rollback failed");
                        false
                    }
                };
                Err(AttemptFailure { error, rolled_back })
            }
        }
    }

    async fn insert_all(
        &self,
        conn: &mut S::Connection,
        records: &[Record],
    ) -> crate::domain::Result<u64> {
        self.sink.begin_transaction(conn).await?;
        let mut rows = 0;
        for chunk in records.chunks(self.rows_per_statement()) {
            rows += self
                .sink
                .execute_batch_insert(conn, &self.table, &self.columns, chunk)
                .await?;
        }
        self.sink.commit(conn).await?;
        Ok(rows)
    }

    /// Largest row count whose bind parameters fit one statement
    fn rows_per_statement(&self) -> usize {
        (self.sink.max_bind_params() / self.columns.len().max(1)).max(1)
    }

    async fn alert(&self, batch: &Batch, outcome: &LoadOutcome, failure: &BatchFailure) {
        let subject = format!(
            "Surge: batch {} of table {} failed",
            outcome.sequence, self.table
        );
        let body = format!(
            "table: {}\nbatch: {}\nrecords: {}\nattempts: {}\nreason: {:?}\nerror: {}\nfirst record: {}",
            self.table,
            outcome.sequence,
            outcome.records,
            outcome.attempts,
            failure.kind,
            failure.error,
            batch
                .records
                .first()
                .map(preview)
                .unwrap_or_else(|| "(empty)".to_string()),
        );
        self.alerts.dispatch(&subject, &body).await;
    }
}

fn preview(record: &Record) -> String {
    let text = record
        .values()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    if text.chars().count() > PREVIEW_CHARS {
        let truncated: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("({truncated}...)")
    } else {
        format!("({text})")
    }
}
