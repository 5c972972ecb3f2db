//! Sink factory
//!
//! Builds the sink selected by configuration and checks that it is reachable
//! before any batch is dispatched.

use crate::adapters::database::traits::Sink;
use crate::adapters::memory::MemorySink;
use crate::adapters::postgresql::PostgresSink;
use crate::config::schema::DatabaseConfig;
use crate::core::load::RetryPolicy;
use crate::domain::errors::{SinkError, SurgeError};
use crate::domain::Result;
use std::sync::Arc;

/// Create the PostgreSQL sink described by `config`
///
/// # Errors
///
/// Returns a configuration error if the connection string doesn't parse.
pub fn create_postgres_sink(config: &DatabaseConfig) -> Result<Arc<PostgresSink>> {
    tracing::info!(ssl_mode = %config.ssl_mode, "Creating PostgreSQL sink");
    Ok(Arc::new(PostgresSink::new(config)?))
}

/// Create the in-memory sink used for dry runs
pub fn create_dry_run_sink() -> Arc<MemorySink> {
    tracing::info!("Dry run: records are counted in memory, nothing is written");
    Arc::new(MemorySink::new())
}

/// Open and health-check one connection, retrying with backoff
///
/// Used at startup so an unreachable sink aborts the run before any batch is
/// dispatched. Failed attempts are retried after `2^k` backoff units, up to
/// `retry.max_retries` times.
pub async fn check_connectivity<S: Sink>(sink: &S, retry: RetryPolicy) -> Result<()> {
    let mut retries = 0;
    loop {
        match try_connect(sink).await {
            Ok(()) => {
                tracing::info!(sink = sink.name(), "Sink connection test successful");
                return Ok(());
            }
            Err(e) if retries < retry.max_retries => {
                retries += 1;
                let wait = retry.backoff(retries);
                tracing::warn!(
                    sink = sink.name(),
                    attempt = retries,
                    max_attempts = retry.max_attempts(),
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "Sink unreachable; retrying"
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn try_connect<S: Sink>(sink: &S) -> Result<()> {
    let mut conn = sink.connect().await?;
    if !sink.is_healthy(&mut conn).await {
        return Err(SurgeError::Sink(SinkError::ConnectionFailed(format!(
            "{} health check failed",
            sink.name()
        ))));
    }
    Ok(())
}
