//! Integration tests for graceful shutdown
//!
//! These tests verify that:
//! - A shutdown signal stops new batches from being dispatched
//! - Batches already in flight finish and are counted
//! - Validation is skipped for an interrupted table
//! - Tables after the interrupted one are not started

mod common;

use common::{generator_config, CountingSource, FailurePlan, FlakySink};
use std::sync::Arc;
use std::time::Duration;
use surge::adapters::alert::AlertDispatcher;
use surge::core::load::{exit_code, LoadCoordinator, LoadRunner, LoadSettings, RunReport};
use surge::core::progress::ProgressMode;
use tokio::sync::watch;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_mid_run_finishes_in_flight_batches() {
    let sink = Arc::new(
        FlakySink::new(FailurePlan::Never).with_insert_delay(Duration::from_millis(20)),
    );
    let config = generator_config(0, 10, 2);
    let table = &config.tables[0];
    let settings = LoadSettings::resolve(&config, table);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let coordinator = LoadCoordinator::new(
        sink.clone(),
        table,
        settings,
        AlertDispatcher::default(),
        ProgressMode::Log,
        shutdown_rx,
    )
    .unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        let _ = shutdown_tx.send(true);
    });

    let summary = coordinator
        .run(Box::new(CountingSource::new(1_000)))
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert!(summary.records_loaded < 1_000);
    assert_eq!(summary.records_loaded % 10, 0);
    assert_eq!(summary.records_loaded, sink.row_count("events"));
    assert_eq!(summary.batches_failed, 0);
    assert_eq!(summary.verdict, None);
    assert_eq!(sink.exclusivity_violations(), 0);
    assert_eq!(summary.exit_code(), exit_code::INTERRUPTED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_skips_remaining_tables() {
    let sink = Arc::new(
        FlakySink::new(FailurePlan::Never).with_insert_delay(Duration::from_millis(20)),
    );
    let mut config = generator_config(1_000, 10, 2);
    let mut archive = config.tables[0].clone();
    archive.table_name = "events_archive".to_string();
    config.tables.push(archive);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        let _ = shutdown_tx.send(true);
    });

    let report = LoadRunner::new(
        sink.clone(),
        AlertDispatcher::default(),
        ProgressMode::Log,
        shutdown_rx,
    )
    .run(&config, &config.tables)
    .await;

    assert_eq!(report.summaries.len(), 1);
    assert!(report.summaries[0].interrupted);
    assert!(sink.row_count("events") < 1_000);
    assert_eq!(sink.row_count("events_archive"), 0);
    assert_eq!(report.exit_code(), exit_code::INTERRUPTED);
}

#[test]
fn test_interrupted_run_wins_exit_code() {
    let mut interrupted = surge::core::load::LoadSummary::new("a");
    interrupted.interrupted = true;
    let mut failed = surge::core::load::LoadSummary::new("b");
    failed.batches_failed = 1;

    let report = RunReport {
        summaries: vec![failed, interrupted],
        failures: Vec::new(),
    };
    assert_eq!(report.exit_code(), exit_code::INTERRUPTED);
}
