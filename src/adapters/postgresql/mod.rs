//! PostgreSQL sink
//!
//! Loads batches into PostgreSQL or wire-compatible databases such as
//! CockroachDB.

pub mod adapter;
pub mod client;
pub mod values;

pub use adapter::{PostgresSink, POSTGRES_MAX_BIND_PARAMS};
pub use client::{PgConnection, PgConnector};
