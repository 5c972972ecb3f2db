//! Bounded worker pool for batch loads
//!
//! At most `num_threads` loads run at once. A batch is only taken from the
//! producer after a slot has been reserved for it, which is what pushes back
//! on the producer.

use super::loader::BatchLoader;
use crate::adapters::database::Sink;
use crate::core::progress::ProgressTracker;
use crate::domain::record::Batch;
use crate::domain::{Result, SurgeError};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};

/// A free worker slot, held until a batch is started in it
pub struct Slot(OwnedSemaphorePermit);

pub struct Dispatcher<S: Sink> {
    loader: Arc<BatchLoader<S>>,
    progress: Arc<ProgressTracker>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
    submitted: u64,
}

impl<S: Sink> Dispatcher<S> {
    pub fn new(
        loader: Arc<BatchLoader<S>>,
        progress: Arc<ProgressTracker>,
        num_threads: usize,
    ) -> Self {
        Self {
            loader,
            progress,
            permits: Arc::new(Semaphore::new(num_threads.max(1))),
            tasks: JoinSet::new(),
            submitted: 0,
        }
    }

    /// Wait for a worker slot to become free
    pub async fn reserve(&self) -> Result<Slot> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map(Slot)
            .map_err(|_| SurgeError::Other("worker pool is closed".to_string()))
    }

    /// Start loading `batch` in a reserved slot
    pub fn start(&mut self, slot: Slot, batch: Batch) {
        self.reap_finished();

        let loader = Arc::clone(&self.loader);
        let progress = Arc::clone(&self.progress);
        tracing::trace!(batch = batch.sequence, records = batch.len(), "Dispatching batch");
        self.tasks.spawn(async move {
            let outcome = loader.load(batch).await;
            progress.record(&outcome);
            drop(slot);
        });
        self.submitted += 1;
    }

    /// Start loading `batch` once a worker slot is free
    pub async fn submit(&mut self, batch: Batch) -> Result<()> {
        let slot = self.reserve().await?;
        self.start(slot, batch);
        Ok(())
    }

    /// Batches submitted so far
    pub fn submitted(&self) -> u64 {
        self.submitted
    }

    /// Wait for every in-flight load to finish
    pub async fn drain(mut self) {
        while let Some(result) = self.tasks.join_next().await {
            log_join_error(result);
        }
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            log_join_error(result);
        }
    }
}

fn log_join_error(result: std::result::Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!(error = %e, "Batch worker task failed");
    }
}
