//! In-memory sink
//!
//! Counts committed rows per table without storing them. Dry runs use it so
//! the whole pipeline (batching, retries, progress, validation) runs without
//! touching a database.

use crate::adapters::database::traits::Sink;
use crate::domain::errors::SinkError;
use crate::domain::ids::{ColumnName, TableName};
use crate::domain::record::Record;
use crate::domain::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Connection handle for [`MemorySink`]
#[derive(Debug)]
pub struct MemoryConnection {
    pub id: u64,
    in_transaction: bool,
    pending: HashMap<String, u64>,
}

/// A sink that keeps committed row counts in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    committed: Mutex<HashMap<String, u64>>,
    next_connection_id: AtomicU64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed rows in `table`
    pub fn row_count(&self, table: &str) -> u64 {
        self.committed().get(table).copied().unwrap_or(0)
    }

    /// Number of connections opened so far
    pub fn connections_opened(&self) -> u64 {
        self.next_connection_id.load(Ordering::SeqCst)
    }

    fn committed(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.committed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Sink for MemorySink {
    type Connection = MemoryConnection;

    fn name(&self) -> &str {
        "memory"
    }

    async fn connect(&self) -> Result<MemoryConnection> {
        let id = self.next_connection_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MemoryConnection {
            id,
            in_transaction: false,
            pending: HashMap::new(),
        })
    }

    async fn is_healthy(&self, _conn: &mut MemoryConnection) -> bool {
        true
    }

    async fn begin_transaction(&self, conn: &mut MemoryConnection) -> Result<()> {
        if conn.in_transaction {
            return Err(SinkError::TransactionFailed(
                "transaction already in progress".to_string(),
            )
            .into());
        }
        conn.in_transaction = true;
        conn.pending.clear();
        Ok(())
    }

    async fn execute_batch_insert(
        &self,
        conn: &mut MemoryConnection,
        table: &TableName,
        columns: &[ColumnName],
        rows: &[Record],
    ) -> Result<u64> {
        if !conn.in_transaction {
            return Err(SinkError::TransactionFailed("no transaction in progress".to_string()).into());
        }
        if let Some(row) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(SinkError::Encoding(format!(
                "row has {} values for {} columns",
                row.len(),
                columns.len()
            ))
            .into());
        }
        *conn.pending.entry(table.as_str().to_string()).or_default() += rows.len() as u64;
        Ok(rows.len() as u64)
    }

    async fn commit(&self, conn: &mut MemoryConnection) -> Result<()> {
        if !conn.in_transaction {
            return Err(SinkError::TransactionFailed("no transaction in progress".to_string()).into());
        }
        let mut committed = self.committed();
        for (table, rows) in conn.pending.drain() {
            *committed.entry(table).or_default() += rows;
        }
        conn.in_transaction = false;
        Ok(())
    }

    async fn rollback(&self, conn: &mut MemoryConnection) -> Result<()> {
        conn.pending.clear();
        conn.in_transaction = false;
        Ok(())
    }

    async fn count_rows(&self, _conn: &mut MemoryConnection, table: &TableName) -> Result<u64> {
        Ok(self.row_count(table.as_str()))
    }

    async fn truncate(&self, _conn: &mut MemoryConnection, table: &TableName) -> Result<()> {
        self.committed().remove(table.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Value;

    fn rows(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new(vec![Value::Int(i as i64)]))
            .collect()
    }

    #[tokio::test]
    async fn test_commit_makes_rows_visible() {
        let sink = MemorySink::new();
        let table = TableName::new("events").unwrap();
        let columns = vec![ColumnName::new("id").unwrap()];
        let mut conn = sink.connect().await.unwrap();

        sink.begin_transaction(&mut conn).await.unwrap();
        sink.execute_batch_insert(&mut conn, &table, &columns, &rows(3))
            .await
            .unwrap();
        assert_eq!(sink.row_count("events"), 0);

        sink.commit(&mut conn).await.unwrap();
        assert_eq!(sink.count_rows(&mut conn, &table).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_rollback_discards_pending_rows() {
        let sink = MemorySink::new();
        let table = TableName::new("events").unwrap();
        let columns = vec![ColumnName::new("id").unwrap()];
        let mut conn = sink.connect().await.unwrap();

        sink.begin_transaction(&mut conn).await.unwrap();
        sink.execute_batch_insert(&mut conn, &table, &columns, &rows(2))
            .await
            .unwrap();
        sink.rollback(&mut conn).await.unwrap();

        assert_eq!(sink.row_count("events"), 0);
        assert!(sink.commit(&mut conn).await.is_err());
    }

    #[tokio::test]
    async fn test_insert_requires_transaction_and_width() {
        let sink = MemorySink::new();
        let table = TableName::new("events").unwrap();
        let columns = vec![ColumnName::new("id").unwrap(), ColumnName::new("kind").unwrap()];
        let mut conn = sink.connect().await.unwrap();

        assert!(sink
            .execute_batch_insert(&mut conn, &table, &columns, &rows(1))
            .await
            .is_err());

        sink.begin_transaction(&mut conn).await.unwrap();
        assert!(sink
            .execute_batch_insert(&mut conn, &table, &columns, &rows(1))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_truncate_and_connection_ids() {
        let sink = MemorySink::new();
        let table = TableName::new("events").unwrap();
        let columns = vec![ColumnName::new("id").unwrap()];
        let mut first = sink.connect().await.unwrap();
        let second = sink.connect().await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(sink.connections_opened(), 2);

        sink.begin_transaction(&mut first).await.unwrap();
        sink.execute_batch_insert(&mut first, &table, &columns, &rows(4))
            .await
            .unwrap();
        sink.commit(&mut first).await.unwrap();
        sink.truncate(&mut first, &table).await.unwrap();
        assert_eq!(sink.row_count("events"), 0);
    }
}
