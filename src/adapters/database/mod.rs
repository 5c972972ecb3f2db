//! Sink abstraction layer
//!
//! This module provides a trait-based abstraction for the load target so the
//! engine can run against PostgreSQL-compatible databases or, for dry runs
//! and tests, an in-memory sink.

pub mod factory;
pub mod traits;

pub use factory::{check_connectivity, create_dry_run_sink, create_postgres_sink};
pub use traits::Sink;
