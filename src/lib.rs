// Surge - Bulk Data Loader for PostgreSQL-compatible Databases
// Copyright (c) 2025 Surge Contributors
// Licensed under the MIT License

//! # Surge - bulk data loader
//!
//! Surge streams records from files (CSV, TSV, JSON, JSON Lines, optionally
//! gzip- or tar.gz-compressed) or from a synthetic generator into tables of a
//! PostgreSQL-compatible database.
//!
//! ## Overview
//!
//! Each configured table is loaded by its own pipeline:
//!
//! - a **source** yields records one at a time
//! - the **batcher** cuts them into fixed-size batches
//! - the **dispatcher** hands each batch to a bounded set of workers
//! - the **batch loader** inserts a batch in one transaction, retrying with
//!   exponential backoff and alerting once when the retries run out
//! - the **validator** compares the table's row count with the number of
//!   records the source produced
//!
//! Connections come from a bounded [`core::load::ResourcePool`]; each is held
//! by exactly one batch at a time.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Load engine, progress tracking and post-load validation
//! - [`adapters`] - Database sinks, record sources and alert delivery
//! - [`domain`] - Records, identifiers and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use surge::adapters::alert::AlertDispatcher;
//! use surge::adapters::database::create_postgres_sink;
//! use surge::config::load_config;
//! use surge::core::load::LoadRunner;
//! use surge::core::progress::ProgressMode;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("surge.toml")?;
//!     let sink = create_postgres_sink(&config.database)?;
//!     let alerts = AlertDispatcher::from_config(&config.alerts)?;
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//!     let report = LoadRunner::new(sink, alerts, ProgressMode::Log, shutdown_rx)
//!         .run(&config, &config.tables)
//!         .await;
//!
//!     println!("Loaded {} records", report.records_loaded());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Library code returns [`domain::Result`], whose error type is
//! [`domain::SurgeError`]. Failed batches are not errors: they are recorded
//! in the table's [`core::load::LoadSummary`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
