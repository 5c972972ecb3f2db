//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use surge::adapters::alert::{AlertDispatcher, AlertSink};
use surge::adapters::database::Sink;
use surge::adapters::memory::{MemoryConnection, MemorySink};
use surge::adapters::source::RecordSource;
use surge::config::{parse_config, SurgeConfig};
use surge::domain::ids::{ColumnName, TableName};
use surge::domain::record::{Record, Value};
use surge::domain::{Result, SinkError};
use tokio::sync::Semaphore;

/// Which insert attempts a [`FlakySink`] rejects
///
/// Batches are told apart by the integer in the first column of their first
/// row.
#[derive(Debug, Clone)]
pub enum FailurePlan {
    Never,
    Always,
    /// The first `n` attempts of every batch fail
    FirstAttempts(u32),
    /// Batches starting at these keys always fail
    Batches(HashSet<i64>),
}

/// A [`MemorySink`] that fails chosen batches and checks that no connection
/// is ever used by two batches at once
pub struct FlakySink {
    inner: MemorySink,
    plan: FailurePlan,
    insert_delay: Duration,
    gate: Option<Arc<Semaphore>>,
    refused_connects: u32,
    connect_attempts: AtomicU32,
    attempts: Mutex<HashMap<i64, u32>>,
    in_use: Mutex<HashSet<u64>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    violations: AtomicUsize,
    inserts: AtomicU64,
}

impl FlakySink {
    pub fn new(plan: FailurePlan) -> Self {
        Self {
            inner: MemorySink::new(),
            plan,
            insert_delay: Duration::ZERO,
            gate: None,
            refused_connects: 0,
            connect_attempts: AtomicU32::new(0),
            attempts: Mutex::new(HashMap::new()),
            in_use: Mutex::new(HashSet::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            violations: AtomicUsize::new(0),
            inserts: AtomicU64::new(0),
        }
    }

    /// Hold every insert for `delay` so batches overlap
    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = delay;
        self
    }

    /// Hold every insert until `gate` has a permit to hand out
    pub fn gated_by(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Make every `connect` fail
    pub fn refusing_connections(self) -> Self {
        self.refusing_first_connections(u32::MAX)
    }

    /// Make the first `n` calls to `connect` fail
    pub fn refusing_first_connections(mut self, n: u32) -> Self {
        self.refused_connects = n;
        self
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn row_count(&self, table: &str) -> u64 {
        self.inner.row_count(table)
    }

    pub fn connections_opened(&self) -> u64 {
        self.inner.connections_opened()
    }

    /// Insert attempts made for the batch starting at `key`
    pub fn attempts_for(&self, key: i64) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_inserts(&self) -> u64 {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Times a connection was picked up while another batch held it
    pub fn exclusivity_violations(&self) -> usize {
        self.violations.load(Ordering::SeqCst)
    }

    /// Most transactions open at the same time
    pub fn max_concurrent_transactions(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn should_fail(&self, key: i64) -> bool {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(key).or_default();
            *count += 1;
            *count
        };
        match &self.plan {
            FailurePlan::Never => false,
            FailurePlan::Always => true,
            FailurePlan::FirstAttempts(n) => attempt <= *n,
            FailurePlan::Batches(keys) => keys.contains(&key),
        }
    }

    fn release(&self, conn: &MemoryConnection) {
        if self.in_use.lock().unwrap().remove(&conn.id) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

fn batch_key(rows: &[Record]) -> i64 {
    match rows.first().and_then(|r| r.values().first()) {
        Some(Value::Int(key)) => *key,
        _ => -1,
    }
}

#[async_trait]
impl Sink for FlakySink {
    type Connection = MemoryConnection;

    fn name(&self) -> &str {
        "flaky"
    }

    async fn connect(&self) -> Result<MemoryConnection> {
        let attempt = self.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.refused_connects {
            return Err(SinkError::ConnectionFailed("connection refused".to_string()).into());
        }
        self.inner.connect().await
    }

    async fn is_healthy(&self, conn: &mut MemoryConnection) -> bool {
        self.inner.is_healthy(conn).await
    }

    async fn begin_transaction(&self, conn: &mut MemoryConnection) -> Result<()> {
        if !self.in_use.lock().unwrap().insert(conn.id) {
            self.violations.fetch_add(1, Ordering::SeqCst);
        } else {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
        }
        self.inner.begin_transaction(conn).await
    }

    async fn execute_batch_insert(
        &self,
        conn: &mut MemoryConnection,
        table: &TableName,
        columns: &[ColumnName],
        rows: &[Record],
    ) -> Result<u64> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _pass = gate.acquire().await;
        }
        if !self.insert_delay.is_zero() {
            tokio::time::sleep(self.insert_delay).await;
        }
        if self.should_fail(batch_key(rows)) {
            return Err(SinkError::InsertFailed {
                message: "could not obtain lock on relation".to_string(),
                code: Some("55P03".to_string()),
            }
            .into());
        }
        self.inner
            .execute_batch_insert(conn, table, columns, rows)
            .await
    }

    async fn commit(&self, conn: &mut MemoryConnection) -> Result<()> {
        let result = self.inner.commit(conn).await;
        self.release(conn);
        result
    }

    async fn rollback(&self, conn: &mut MemoryConnection) -> Result<()> {
        let result = self.inner.rollback(conn).await;
        self.release(conn);
        result
    }

    async fn count_rows(&self, conn: &mut MemoryConnection, table: &TableName) -> Result<u64> {
        self.inner.count_rows(conn, table).await
    }

    async fn truncate(&self, conn: &mut MemoryConnection, table: &TableName) -> Result<()> {
        self.inner.truncate(conn, table).await
    }
}

/// Alert sink that remembers what it was sent
#[derive(Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<(String, String)>>,
}

impl RecordingAlertSink {
    pub fn alerts(&self) -> Vec<(String, String)> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        self.alerts
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// A dispatcher delivering only to a fresh [`RecordingAlertSink`]
pub fn recording_alerts() -> (AlertDispatcher, Arc<RecordingAlertSink>) {
    let sink = Arc::new(RecordingAlertSink::default());
    (AlertDispatcher::new(vec![sink.clone() as Arc<dyn AlertSink>]), sink)
}

/// Source yielding `id` values `1..=n`
pub struct CountingSource {
    next: i64,
    n: i64,
    report_total: bool,
    pulled: Arc<AtomicU64>,
}

impl CountingSource {
    pub fn new(n: u64) -> Self {
        Self {
            next: 1,
            n: n as i64,
            report_total: true,
            pulled: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Count every record handed out in `pulled`
    pub fn counting_pulls(mut self, pulled: Arc<AtomicU64>) -> Self {
        self.pulled = pulled;
        self
    }

    /// Withhold the total, like a file source that skips the counting pass
    pub fn without_total(mut self) -> Self {
        self.report_total = false;
        self
    }
}

impl RecordSource for CountingSource {
    fn next_record(&mut self) -> Result<Option<Record>> {
        if self.next > self.n {
            return Ok(None);
        }
        let record = Record::new(vec![Value::Int(self.next)]);
        self.next += 1;
        self.pulled.fetch_add(1, Ordering::SeqCst);
        Ok(Some(record))
    }

    fn total_count(&self) -> Option<u64> {
        self.report_total.then_some(self.n as u64)
    }
}

/// Single-table configuration for an `id` column fed by a generator
pub fn generator_config(num_records: u64, batch_size: usize, num_threads: usize) -> SurgeConfig {
    parse_config(&format!(
        r#"
[database]
connection_string = "postgresql://loader@localhost/app"

[load]
batch_size = {batch_size}
num_threads = {num_threads}
max_retries = 2
backoff_unit_ms = 1

[[tables]]
table_name = "events"
columns = ["id"]

[tables.source]
type = "generator"
num_records = {num_records}
fields = [{{ name = "id", kind = "sequence" }}]
"#
    ))
    .expect("valid test configuration")
}
