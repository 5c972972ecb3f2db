//! Core business logic for Surge.
//!
//! # Modules
//!
//! - [`load`] - Batching, bounded worker dispatch, transactional batch loads
//!   with retry, and per-table coordination
//! - [`progress`] - Thread-safe progress aggregation and reporters
//! - [`verification`] - Post-load row count validation
//!
//! # Load Workflow
//!
//! For every configured table:
//!
//! 1. **Open**: Open the record source (counting its rows when possible)
//! 2. **Truncate** (optional): Empty the target table
//! 3. **Batch**: Group records into fixed-size batches on a blocking thread
//! 4. **Dispatch**: Load up to `num_threads` batches at once, each in its own
//!    transaction, retrying with exponential backoff
//! 5. **Alert**: Notify once for every batch that fails terminally
//! 6. **Validate**: Compare the table's row count with the expected total
//! 7. **Report**: Produce a load summary
//!
//! # Example
//!
//! ```rust,no_run
//! use surge::adapters::alert::AlertDispatcher;
//! use surge::adapters::database::create_dry_run_sink;
//! use surge::config::load_config;
//! use surge::core::load::LoadRunner;
//! use surge::core::progress::ProgressMode;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("surge.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let runner = LoadRunner::new(
//!     create_dry_run_sink(),
//!     AlertDispatcher::from_config(&config.alerts)?,
//!     ProgressMode::Log,
//!     shutdown_rx,
//! );
//! let report = runner.run(&config, &config.tables).await;
//!
//! println!("Loaded: {}", report.records_loaded());
//! # Ok(())
//! # }
//! ```

pub mod load;
pub mod progress;
pub mod verification;
