//! Load coordinator - wires one table's run together
//!
//! The coordinator truncates the table if asked, opens the pool, drives the
//! producer and dispatcher, validates the row count and assembles the
//! [`LoadSummary`]. [`LoadRunner`] runs the selected tables one after another,
//! so a run never holds more than one table's pool, and collects the results
//! into a [`RunReport`].

use super::batcher::Batcher;
use super::dispatcher::{Dispatcher, Slot};
use super::loader::BatchLoader;
use super::pool::ResourcePool;
use super::summary::{LoadError, LoadErrorType, LoadSummary, RunReport, TableFailure};
use super::LoadSettings;
use crate::adapters::alert::AlertDispatcher;
use crate::adapters::database::Sink;
use crate::adapters::source::{open_source, RecordSource};
use crate::config::{SurgeConfig, TableConfig};
use crate::core::progress::{ProgressMode, ProgressTracker};
use crate::core::verification::Validator;
use crate::domain::ids::{ColumnName, TableName};
use crate::domain::record::Batch;
use crate::domain::{Result, SurgeError};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};

/// What the producer thread saw by the time it stopped
#[derive(Debug, Clone, Copy, Default)]
struct ProducerReport {
    records_emitted: u64,
    exhausted: bool,
}

/// Runs the load of a single table
pub struct LoadCoordinator<S: Sink> {
    sink: Arc<S>,
    table: TableName,
    columns: Vec<ColumnName>,
    settings: LoadSettings,
    alerts: AlertDispatcher,
    progress: ProgressMode,
    shutdown: watch::Receiver<bool>,
    dry_run: bool,
}

impl<S: Sink> LoadCoordinator<S> {
    /// Create a coordinator for `table`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the table or a column name is not a
    /// valid identifier.
    pub fn new(
        sink: Arc<S>,
        table: &TableConfig,
        settings: LoadSettings,
        alerts: AlertDispatcher,
        progress: ProgressMode,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let name = table.table().map_err(SurgeError::Configuration)?;
        let columns = table.column_names().map_err(SurgeError::Configuration)?;
        Ok(Self {
            sink,
            table: name,
            columns,
            settings,
            alerts,
            progress,
            shutdown,
            dry_run: false,
        })
    }

    /// Mark the summary as a dry run
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Load every record of `source` into the table
    ///
    /// Batch failures, a mid-stream source error and validation problems are
    /// recorded in the summary. An error is returned only when the run could
    /// not start (pool construction or truncate failed).
    pub async fn run(self, source: Box<dyn RecordSource>) -> Result<LoadSummary> {
        let start = Instant::now();
        tracing::info!(
            table = %self.table,
            columns = self.columns.len(),
            batch_size = self.settings.batch_size,
            num_threads = self.settings.num_threads,
            max_retries = self.settings.retry.max_retries,
            pool_size = self.settings.pool.max_size,
            total_expected = source.total_count(),
            "Starting table load"
        );

        let pool = ResourcePool::new(Arc::clone(&self.sink), self.settings.pool)?;
        if self.settings.truncate && !*self.shutdown.borrow() {
            self.truncate(&pool).await?;
        }

        let total = source.total_count();
        let reporter = self.progress.reporter(self.table.as_str(), total);
        let tracker = Arc::new(ProgressTracker::new(total, reporter));
        let loader = Arc::new(BatchLoader::new(
            Arc::clone(&self.sink),
            pool.clone(),
            self.table.clone(),
            self.columns.clone(),
            self.settings.retry,
            self.alerts.clone(),
        ));
        let mut dispatcher = Dispatcher::new(loader, Arc::clone(&tracker), self.settings.num_threads);

        // Capacity one keeps at most one finished batch waiting on the workers
        let (tx, mut rx) = mpsc::channel::<Result<Batch>>(1);
        let batch_size = self.settings.batch_size;
        let producer = tokio::task::spawn_blocking(move || {
            let mut batcher = Batcher::new(source, batch_size);
            for item in batcher.by_ref() {
                if tx.blocking_send(item).is_err() {
                    break;
                }
            }
            ProducerReport {
                records_emitted: batcher.records_emitted(),
                exhausted: batcher.is_exhausted(),
            }
        });

        let mut shutdown = self.shutdown.clone();
        let mut shutdown_live = true;
        let mut interrupted = *shutdown.borrow();
        let mut summary = LoadSummary::new(self.table.as_str());
        let mut slot: Option<Slot> = None;

        while !interrupted {
            tokio::select! {
                biased;

                changed = shutdown.changed(), if shutdown_live => {
                    if changed.is_err() {
                        // Sender gone; nothing can signal shutdown any more
                        shutdown_live = false;
                    } else if *shutdown.borrow() {
                        tracing::warn!(
                            table = %self.table,
                            "Shutdown requested; finishing in-flight batches"
                        );
                        interrupted = true;
                    }
                }
                reserved = dispatcher.reserve(), if slot.is_none() => match reserved {
                    Ok(free) => slot = Some(free),
                    Err(e) => {
                        summary.add_error(LoadError::new(LoadErrorType::Dispatch, e.to_string()));
                        break;
                    }
                },
                item = rx.recv(), if slot.is_some() => match item {
                    Some(Ok(batch)) => {
                        if let Some(free) = slot.take() {
                            dispatcher.start(free, batch);
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!(
                            table = %self.table,
                            error = %e,
                            "Source failed; no further batches will be dispatched"
                        );
                        self.alerts
                            .dispatch(
                                &format!("Surge: source for table {} failed", self.table),
                                &format!("table: {}\nerror: {e}", self.table),
                            )
                            .await;
                        summary.add_error(LoadError::new(LoadErrorType::Source, e.to_string()));
                        break;
                    }
                    None => break,
                }
            }
        }
        drop(slot);

        // Closing the channel stops the producer at its next send
        drop(rx);
        let produced = match producer.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(table = %self.table, error = %e, "Producer task failed");
                summary.add_error(LoadError::new(LoadErrorType::Source, e.to_string()));
                ProducerReport::default()
            }
        };
        tracing::debug!(
            table = %self.table,
            batches = dispatcher.submitted(),
            "All batches dispatched; waiting for workers"
        );
        dispatcher.drain().await;

        if produced.exhausted && tracker.set_total(produced.records_emitted) {
            tracing::info!(
                table = %self.table,
                total = produced.records_emitted,
                "Source exhausted; total now known"
            );
        }

        if interrupted {
            tracing::warn!(table = %self.table, "Load interrupted; skipping validation");
        } else {
            let expected = tracker
                .total_expected()
                .unwrap_or(produced.records_emitted);
            let validator = Validator::new(Arc::clone(&self.sink), pool.clone());
            match validator.validate(&self.table, expected).await {
                Ok(report) => summary.verdict = Some(report.verdict),
                Err(e) => {
                    tracing::error!(table = %self.table, error = %e, "Validation query failed");
                    summary.add_error(LoadError::new(LoadErrorType::Validation, e.to_string()));
                }
            }
        }

        let state = tracker.finish();
        pool.close();

        let mut summary = summary
            .with_progress(&state)
            .with_duration(start.elapsed());
        summary.interrupted = interrupted;
        summary.dry_run = self.dry_run;
        Ok(summary)
    }

    async fn truncate(&self, pool: &ResourcePool<S>) -> Result<()> {
        let mut conn = pool.acquire().await?;
        self.sink.truncate(&mut conn, &self.table).await?;
        tracing::info!(table = %self.table, "Table truncated before load");
        Ok(())
    }
}

/// Runs a set of tables in order, one coordinator each
pub struct LoadRunner<S: Sink> {
    sink: Arc<S>,
    alerts: AlertDispatcher,
    progress: ProgressMode,
    shutdown: watch::Receiver<bool>,
    dry_run: bool,
}

impl<S: Sink> LoadRunner<S> {
    pub fn new(
        sink: Arc<S>,
        alerts: AlertDispatcher,
        progress: ProgressMode,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            sink,
            alerts,
            progress,
            shutdown,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Load `tables` in configuration order
    ///
    /// Tables are not loaded in parallel: the connection bound of a run is
    /// that of its largest table. Once a table is interrupted the remaining
    /// tables are skipped.
    pub async fn run(&self, config: &SurgeConfig, tables: &[TableConfig]) -> RunReport {
        let mut report = RunReport::default();
        for (index, table) in tables.iter().enumerate() {
            if report.summaries.iter().any(|s| s.interrupted) {
                tracing::warn!(
                    skipped = tables.len() - index,
                    "Run interrupted; remaining tables not loaded"
                );
                break;
            }
            match self.run_table(config, table).await {
                Ok(summary) => report.summaries.push(summary),
                Err(failure) => report.failures.push(failure),
            }
        }
        report
    }

    async fn run_table(
        &self,
        config: &SurgeConfig,
        table: &TableConfig,
    ) -> std::result::Result<LoadSummary, TableFailure> {
        match self.try_run_table(config, table).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                tracing::error!(table = %table.table_name, error = %e, "Table load aborted");
                self.alerts
                    .dispatch(
                        &format!("Surge: load of table {} aborted", table.table_name),
                        &format!("table: {}\nerror: {e}", table.table_name),
                    )
                    .await;
                Err(TableFailure::from_error(&table.table_name, &e))
            }
        }
    }

    async fn try_run_table(&self, config: &SurgeConfig, table: &TableConfig) -> Result<LoadSummary> {
        let settings = LoadSettings::resolve(config, table);

        // Opening may pre-scan the whole file
        let source = {
            let table = table.clone();
            tokio::task::spawn_blocking(move || open_source(&table))
                .await
                .map_err(|e| SurgeError::Other(format!("source task failed: {e}")))??
        };

        LoadCoordinator::new(
            Arc::clone(&self.sink),
            table,
            settings,
            self.alerts.clone(),
            self.progress.clone(),
            self.shutdown.clone(),
        )?
        .dry_run(self.dry_run)
        .run(source)
        .await
    }
}
