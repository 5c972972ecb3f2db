//! PostgreSQL connection factory
//!
//! Connections are opened through `deadpool-postgres`'s manager, which hides
//! the TLS connector type, keeps a per-connection prepared statement cache and
//! spawns the connection driver task. Pooling itself happens in the load
//! engine's resource pool.

use crate::config::schema::DatabaseConfig;
use crate::domain::errors::{SinkError, SurgeError};
use crate::domain::Result;
use deadpool::managed::Manager as _;
use deadpool_postgres::{ClientWrapper, Manager, ManagerConfig, RecyclingMethod};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::config::SslMode;
use tokio_postgres::NoTls;

/// A live PostgreSQL connection
pub type PgConnection = ClientWrapper;

/// Opens PostgreSQL connections with the configured TLS mode and timeouts
pub struct PgConnector {
    manager: Manager,
    connect_timeout: Duration,
    statement_timeout_ms: u64,
    endpoint: String,
}

impl PgConnector {
    /// Create a connector from the database configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the connection string doesn't parse
    /// or the TLS connector can't be built.
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let conn_str = config.connection_string.expose_secret();
        let mut pg_config: tokio_postgres::Config = conn_str.as_str().parse().map_err(|e| {
            SurgeError::Configuration(format!("Invalid PostgreSQL connection string: {e}"))
        })?;

        let connect_timeout = Duration::from_secs(config.connection_timeout_seconds);
        pg_config.connect_timeout(connect_timeout);

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = match config.ssl_mode.as_str() {
            "disable" => {
                pg_config.ssl_mode(SslMode::Disable);
                Manager::from_config(pg_config, NoTls, manager_config)
            }
            mode => {
                pg_config.ssl_mode(if mode == "require" {
                    SslMode::Require
                } else {
                    SslMode::Prefer
                });
                let connector = native_tls::TlsConnector::new().map_err(|e| {
                    SurgeError::Configuration(format!("Failed to initialize TLS: {e}"))
                })?;
                Manager::from_config(
                    pg_config,
                    postgres_native_tls::MakeTlsConnector::new(connector),
                    manager_config,
                )
            }
        };

        Ok(Self {
            manager,
            connect_timeout,
            statement_timeout_ms: config.statement_timeout_seconds * 1000,
            endpoint: redact_connection_string(conn_str.as_str()),
        })
    }

    /// Open a connection and apply the session statement timeout
    pub async fn connect(&self) -> Result<PgConnection> {
        let client = tokio::time::timeout(self.connect_timeout, self.manager.create())
            .await
            .map_err(|_| {
                SinkError::ConnectionFailed(format!(
                    "timed out after {}s connecting to {}",
                    self.connect_timeout.as_secs(),
                    self.endpoint
                ))
            })?
            .map_err(|e| {
                SinkError::ConnectionFailed(format!("{}: {e}", self.endpoint))
            })?;

        client
            .batch_execute(&format!(
                "SET statement_timeout = {}",
                self.statement_timeout_ms
            ))
            .await
            .map_err(|e| {
                SinkError::ConnectionFailed(format!("Failed to set statement timeout: {e}"))
            })?;

        tracing::debug!(endpoint = %self.endpoint, "Opened PostgreSQL connection");
        Ok(client)
    }

    /// The connection target with credentials removed
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Strips everything before `@` so credentials never reach logs
pub fn redact_connection_string(conn_str: &str) -> String {
    conn_str
        .rsplit_once('@')
        .map(|(_, host)| format!("postgresql://***@{host}"))
        .unwrap_or_else(|| conn_str.to_string())
}
