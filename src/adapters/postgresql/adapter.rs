//! PostgreSQL sink
//!
//! Implements [`Sink`] for PostgreSQL and wire-compatible databases
//! (CockroachDB included) with multi-row parameterized inserts.

use crate::adapters::database::traits::Sink;
use crate::adapters::postgresql::client::{PgConnection, PgConnector};
use crate::config::schema::DatabaseConfig;
use crate::domain::errors::SinkError;
use crate::domain::ids::{ColumnName, TableName};
use crate::domain::record::Record;
use crate::domain::Result;
use async_trait::async_trait;
use tokio_postgres::types::ToSql;

/// Protocol limit on bind parameters per statement
pub const POSTGRES_MAX_BIND_PARAMS: usize = 65_535;

/// PostgreSQL implementation of [`Sink`]
pub struct PostgresSink {
    connector: PgConnector,
}

impl PostgresSink {
    /// Create a new PostgreSQL sink
    ///
    /// No connection is opened until the pool asks for one.
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            connector: PgConnector::new(config)?,
        })
    }

    /// The connection target with credentials removed
    pub fn endpoint(&self) -> &str {
        self.connector.endpoint()
    }
}

/// Builds `INSERT INTO t (a, b) VALUES ($1, $2), ($3, $4)` for `rows` rows
pub fn build_insert_sql(table: &TableName, columns: &[ColumnName], rows: usize) -> String {
    let column_list = columns
        .iter()
        .map(ColumnName::quoted)
        .collect::<Vec<_>>()
        .join(", ");

    let width = columns.len();
    let mut sql = format!("INSERT INTO {} ({column_list}) VALUES ", table.quoted());
    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for col in 0..width {
            if col > 0 {
                sql.push_str(", ");
            }
            sql.push('$');
            sql.push_str(&(row * width + col + 1).to_string());
        }
        sql.push(')');
    }
    sql
}

fn insert_error(e: tokio_postgres::Error) -> SinkError {
    SinkError::InsertFailed {
        code: e.code().map(|c| c.code().to_string()),
        message: e
            .as_db_error()
            .map(|db| db.message().to_string())
            .unwrap_or_else(|| e.to_string()),
    }
}

#[async_trait]
impl Sink for PostgresSink {
    type Connection = PgConnection;

    fn name(&self) -> &str {
        "postgresql"
    }

    async fn connect(&self) -> Result<PgConnection> {
        self.connector.connect().await
    }

    async fn is_healthy(&self, conn: &mut PgConnection) -> bool {
        if conn.is_closed() {
            return false;
        }
        conn.simple_query("SELECT 1").await.is_ok()
    }

    async fn begin_transaction(&self, conn: &mut PgConnection) -> Result<()> {
        conn.batch_execute("BEGIN")
            .await
            .map_err(|e| SinkError::TransactionFailed(format!("BEGIN failed: {e}")))?;
        Ok(())
    }

    async fn execute_batch_insert(
        &self,
        conn: &mut PgConnection,
        table: &TableName,
        columns: &[ColumnName],
        rows: &[Record],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(rows.len() * columns.len());
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(SinkError::Encoding(format!(
                    "row {} has {} values for {} columns",
                    index + 1,
                    row.len(),
                    columns.len()
                ))
                .into());
            }
            params.extend(row.values().iter().map(|v| v as &(dyn ToSql + Sync)));
        }

        let sql = build_insert_sql(table, columns, rows.len());
        let statement = conn.prepare_cached(&sql).await.map_err(insert_error)?;
        let inserted = conn
            .execute(&statement, &params)
            .await
            .map_err(insert_error)?;

        tracing::trace!(table = %table, rows = inserted, "Inserted rows");
        Ok(inserted)
    }

    async fn commit(&self, conn: &mut PgConnection) -> Result<()> {
        conn.batch_execute("COMMIT")
            .await
            .map_err(|e| SinkError::TransactionFailed(format!("COMMIT failed: {e}")))?;
        Ok(())
    }

    async fn rollback(&self, conn: &mut PgConnection) -> Result<()> {
        conn.batch_execute("ROLLBACK")
            .await
            .map_err(|e| SinkError::TransactionFailed(format!("ROLLBACK failed: {e}")))?;
        Ok(())
    }

    async fn count_rows(&self, conn: &mut PgConnection, table: &TableName) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.quoted());
        let row = conn
            .query_one(sql.as_str(), &[])
            .await
            .map_err(|e| SinkError::CountFailed(format!("{table}: {e}")))?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| SinkError::CountFailed(format!("{table}: {e}")))?;
        Ok(count.max(0) as u64)
    }

    async fn truncate(&self, conn: &mut PgConnection, table: &TableName) -> Result<()> {
        conn.batch_execute(&format!("TRUNCATE TABLE {}", table.quoted()))
            .await
            .map_err(|e| SinkError::TruncateFailed(format!("{table}: {e}")))?;
        tracing::info!(table = %table, "Truncated table");
        Ok(())
    }

    fn max_bind_params(&self) -> usize {
        POSTGRES_MAX_BIND_PARAMS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<ColumnName> {
        names.iter().map(|n| ColumnName::new(*n).unwrap()).collect()
    }

    #[test]
    fn test_build_insert_sql_single_row() {
        let table = TableName::new("users").unwrap();
        let sql = build_insert_sql(&table, &columns(&["id", "email"]), 1);
        assert_eq!(
            sql,
            "INSERT INTO \"users\" (\"id\", \"email\") VALUES ($1, $2)"
        );
    }

    #[test]
    fn test_build_insert_sql_multi_row_numbering() {
        let table = TableName::new("crm.contacts").unwrap();
        let sql = build_insert_sql(&table, &columns(&["a", "b", "c"]), 3);
        assert_eq!(
            sql,
            "INSERT INTO \"crm\".\"contacts\" (\"a\", \"b\", \"c\") VALUES \
             ($1, $2, $3), ($4, $5, $6), ($7, $8, $9)"
        );
    }
}
