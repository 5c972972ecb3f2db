//! Domain types for Surge.
//!
//! The domain layer provides:
//! - **Error types** ([`SurgeError`], [`SourceError`], [`SinkError`])
//! - **Result type alias** ([`Result`])
//! - **Validated identifiers** ([`TableName`], [`ColumnName`])
//! - **Data model** ([`Value`], [`Record`], [`Batch`])
//!
//! Identifiers are newtypes so that only validated names reach SQL text:
//!
//! ```rust
//! use surge::domain::{ColumnName, TableName};
//!
//! # fn example() -> Result<(), String> {
//! let table = TableName::new("public.events")?;
//! let column = ColumnName::new("payload")?;
//! assert_eq!(
//!     format!("INSERT INTO {} ({})", table.quoted(), column.quoted()),
//!     "INSERT INTO \"public\".\"events\" (\"payload\")"
//! );
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod ids;
pub mod record;
pub mod result;

pub use errors::{SinkError, SourceError, SurgeError};
pub use ids::{ColumnName, TableName};
pub use record::{Batch, Record, Value};
pub use result::Result;
