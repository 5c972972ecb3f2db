//! Concurrent batch-loading engine
//!
//! Records flow from a source through the [`Batcher`] on a blocking thread,
//! over a channel of capacity one to the [`Dispatcher`], which runs up to
//! `num_threads` [`BatchLoader`] invocations at a time against a shared
//! [`ResourcePool`]. Outcomes are folded into a progress tracker and the
//! table's row count is validated once every batch has finished.

pub mod batcher;
pub mod coordinator;
pub mod dispatcher;
pub mod loader;
pub mod pool;
pub mod summary;

pub use batcher::Batcher;
pub use coordinator::{LoadCoordinator, LoadRunner};
pub use dispatcher::{Dispatcher, Slot};
pub use loader::{BatchFailure, BatchLoader, FailureKind, LoadOutcome, LoadState, RetryPolicy};
pub use pool::{PoolSettings, PooledConnection, ResourcePool, SinkManager};
pub use summary::{exit_code, LoadError, LoadErrorType, LoadSummary, RunReport, TableFailure};

use crate::config::{SurgeConfig, TableConfig};
use std::time::Duration;

/// Effective tuning for one table: global `[load]` values with the table's
/// overrides applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSettings {
    pub batch_size: usize,
    pub num_threads: usize,
    pub retry: RetryPolicy,
    pub truncate: bool,
    pub pool: PoolSettings,
}

impl LoadSettings {
    pub fn resolve(config: &SurgeConfig, table: &TableConfig) -> Self {
        let load = &config.load;
        let num_threads = table.num_threads.unwrap_or(load.num_threads);
        let pool = PoolSettings {
            max_size: config.database.pool_size.unwrap_or(num_threads),
            create_timeout: Some(Duration::from_secs(
                config.database.connection_timeout_seconds,
            )),
            wait_timeout: None,
        };

        Self {
            batch_size: table.batch_size.unwrap_or(load.batch_size),
            num_threads,
            retry: RetryPolicy::new(
                table.max_retries.unwrap_or(load.max_retries),
                Duration::from_millis(load.backoff_unit_ms),
            ),
            truncate: table.truncate_table.unwrap_or(load.truncate_table),
            pool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const CONFIG: &str = r#"
[database]
connection_string = "postgresql://loader@localhost:26257/app"
pool_size = 2

[load]
batch_size = 500
num_threads = 8
max_retries = 4
backoff_unit_ms = 250
truncate_table = true

[[tables]]
table_name = "users"
columns = ["id"]
batch_size = 50
truncate_table = false

[tables.source]
type = "generator"
num_records = 10
fields = [{ name = "id", kind = "sequence" }]

[[tables]]
table_name = "orders"
columns = ["id"]
num_threads = 2
max_retries = 0

[tables.source]
type = "generator"
num_records = 10
fields = [{ name = "id", kind = "sequence" }]
"#;

    #[test]
    fn test_table_overrides() {
        let config = parse_config(CONFIG).unwrap();

        let users = LoadSettings::resolve(&config, &config.tables[0]);
        assert_eq!(users.batch_size, 50);
        assert_eq!(users.num_threads, 8);
        assert_eq!(users.retry.max_retries, 4);
        assert_eq!(users.retry.backoff_unit, Duration::from_millis(250));
        assert!(!users.truncate);
        assert_eq!(users.pool.max_size, 2);

        let orders = LoadSettings::resolve(&config, &config.tables[1]);
        assert_eq!(orders.batch_size, 500);
        assert_eq!(orders.num_threads, 2);
        assert_eq!(orders.retry.max_retries, 0);
        assert!(orders.truncate);
    }

    #[test]
    fn test_pool_defaults_to_thread_count() {
        let mut config = parse_config(CONFIG).unwrap();
        config.database.pool_size = None;
        let orders = LoadSettings::resolve(&config, &config.tables[1]);
        assert_eq!(orders.pool.max_size, 2);
        assert_eq!(orders.pool.create_timeout, Some(Duration::from_secs(30)));
    }
}
