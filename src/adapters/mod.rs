//! External system integrations for Surge.
//!
//! - [`source`] - Record sources (CSV/TSV, JSON, JSON Lines, synthetic)
//! - [`database`] - Sink abstraction layer (trait-based)
//! - [`postgresql`] - PostgreSQL/CockroachDB sink
//! - [`memory`] - In-memory sink for dry runs
//! - [`alert`] - Alert delivery (Slack, email, log)
//!
//! # Design Pattern
//!
//! Adapters isolate external dependencies behind traits so the load engine
//! can be tested against in-memory implementations.
//!
//! ```rust,no_run
//! use surge::adapters::database::{check_connectivity, create_postgres_sink};
//! use surge::config::load_config;
//! use surge::core::load::RetryPolicy;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("surge.toml")?;
//! let sink = create_postgres_sink(&config.database)?;
//! check_connectivity(sink.as_ref(), RetryPolicy::new(3, Duration::from_secs(1))).await?;
//! # Ok(())
//! # }
//! ```

pub mod alert;
pub mod database;
pub mod memory;
pub mod postgresql;
pub mod source;
