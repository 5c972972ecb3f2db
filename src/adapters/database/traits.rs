//! Sink abstraction traits
//!
//! This module defines the trait that database adapters implement so the load
//! engine can write batches without knowing which database sits behind it.

use crate::domain::ids::{ColumnName, TableName};
use crate::domain::record::Record;
use crate::domain::Result;
use async_trait::async_trait;

/// A relational sink that batches are loaded into
///
/// Connections are created by [`Sink::connect`] and then owned by the
/// resource pool; every other method borrows one exclusively for the duration
/// of the call. Transaction control is explicit so the batch loader can roll
/// back and retry on the same connection.
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    /// Exclusive-use handle to the sink
    type Connection: Send + 'static;

    /// Short backend name used in logs (e.g. "postgresql")
    fn name(&self) -> &str;

    /// Open a new connection
    ///
    /// # Errors
    ///
    /// Returns an error if the sink is unreachable or rejects the credentials.
    async fn connect(&self) -> Result<Self::Connection>;

    /// Cheap liveness check run before a pooled connection is handed out
    async fn is_healthy(&self, conn: &mut Self::Connection) -> bool;

    async fn begin_transaction(&self, conn: &mut Self::Connection) -> Result<()>;

    /// Insert `rows` into `table`, values positionally matching `columns`
    ///
    /// Callers keep `rows.len() * columns.len()` within
    /// [`Sink::max_bind_params`]. Returns the number of rows written.
    async fn execute_batch_insert(
        &self,
        conn: &mut Self::Connection,
        table: &TableName,
        columns: &[ColumnName],
        rows: &[Record],
    ) -> Result<u64>;

    async fn commit(&self, conn: &mut Self::Connection) -> Result<()>;

    async fn rollback(&self, conn: &mut Self::Connection) -> Result<()>;

    /// Number of rows currently persisted in `table`
    async fn count_rows(&self, conn: &mut Self::Connection, table: &TableName) -> Result<u64>;

    /// Remove every row from `table`
    async fn truncate(&self, conn: &mut Self::Connection, table: &TableName) -> Result<()>;

    /// Largest number of bind parameters a single insert statement may carry
    fn max_bind_params(&self) -> usize {
        usize::MAX
    }
}
