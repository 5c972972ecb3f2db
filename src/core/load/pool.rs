//! Bounded pool of sink connections
//!
//! Built on `deadpool`'s managed pool. A checked-out [`PooledConnection`]
//! returns itself to the pool when dropped, whatever path the worker takes
//! out of the batch. Connections that fail their health check on checkout
//! are discarded and replaced.

use crate::adapters::database::Sink;
use crate::domain::errors::{SinkError, SurgeError};
use crate::domain::Result;
use deadpool::managed::{self, Metrics, Object, Pool, PoolError, RecycleError, RecycleResult};
use std::sync::Arc;
use std::time::Duration;

/// Creates and health-checks connections for the pool
pub struct SinkManager<S: Sink> {
    sink: Arc<S>,
}

impl<S: Sink> SinkManager<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self { sink }
    }
}

impl<S: Sink> managed::Manager for SinkManager<S> {
    type Type = S::Connection;
    type Error = SurgeError;

    async fn create(&self) -> std::result::Result<S::Connection, SurgeError> {
        tracing::debug!(sink = self.sink.name(), "Opening sink connection");
        self.sink.connect().await
    }

    async fn recycle(
        &self,
        conn: &mut S::Connection,
        _metrics: &Metrics,
    ) -> RecycleResult<SurgeError> {
        if self.sink.is_healthy(conn).await {
            Ok(())
        } else {
            tracing::warn!(sink = self.sink.name(), "Discarding unhealthy connection");
            Err(RecycleError::Backend(SurgeError::Sink(
                SinkError::ConnectionFailed("health check failed".to_string()),
            )))
        }
    }
}

/// A connection on loan from the pool
pub type PooledConnection<S> = Object<SinkManager<S>>;

/// Pool sizing and timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_size: usize,
    /// Limit on opening a new connection
    pub create_timeout: Option<Duration>,
    /// Limit on waiting for a free connection; `None` waits indefinitely
    pub wait_timeout: Option<Duration>,
}

impl PoolSettings {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            create_timeout: None,
            wait_timeout: None,
        }
    }
}

/// Pool handle shared by every worker of a run
pub struct ResourcePool<S: Sink> {
    pool: Pool<SinkManager<S>>,
}

// Derived Clone would require `S: Clone`; the handle only clones the pool.
impl<S: Sink> Clone for ResourcePool<S> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<S: Sink> ResourcePool<S> {
    pub fn new(sink: Arc<S>, settings: PoolSettings) -> Result<Self> {
        let mut builder = Pool::builder(SinkManager::new(sink))
            .max_size(settings.max_size)
            .create_timeout(settings.create_timeout)
            .wait_timeout(settings.wait_timeout);
        if settings.create_timeout.is_some() || settings.wait_timeout.is_some() {
            builder = builder.runtime(deadpool::Runtime::Tokio1);
        }

        let pool = builder
            .build()
            .map_err(|e| SurgeError::Configuration(format!("Failed to build pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Check out a connection, waiting for one to become free
    ///
    /// Any pool-level failure (sink unreachable, wait timeout, closed pool)
    /// is reported as [`SurgeError::PoolUnavailable`].
    pub async fn acquire(&self) -> Result<PooledConnection<S>> {
        self.pool.get().await.map_err(|e| match e {
            PoolError::Backend(inner) => SurgeError::PoolUnavailable(inner.to_string()),
            other => SurgeError::PoolUnavailable(other.to_string()),
        })
    }

    /// Return a connection early; dropping the handle does the same
    pub fn release(&self, conn: PooledConnection<S>) {
        drop(conn);
    }

    /// Remove a connection from the pool and close it
    pub fn discard(&self, conn: PooledConnection<S>) {
        drop(Object::take(conn));
    }

    pub fn max_size(&self) -> usize {
        self.pool.status().max_size
    }

    /// Connections currently open, idle or on loan
    pub fn size(&self) -> usize {
        self.pool.status().size
    }

    pub fn close(&self) {
        self.pool.close();
    }
}
