//! Load command implementation
//!
//! This module implements the `load` command, which streams every configured
//! table (or the ones picked with `--table`) into the database.

use crate::adapters::alert::AlertDispatcher;
use crate::adapters::database::{
    check_connectivity, create_dry_run_sink, create_postgres_sink, Sink,
};
use crate::config::{load_config, ConfigWatcher, SourceConfig, SurgeConfig, TableConfig};
use crate::core::load::{exit_code, LoadRunner, RetryPolicy, RunReport};
use crate::core::progress::ProgressMode;
use crate::core::verification::Verdict;
use clap::Args;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Arguments for the load command
#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Load only this table (repeatable)
    #[arg(long, value_name = "NAME")]
    pub table: Vec<String>,

    /// Truncate every selected table before loading it
    #[arg(long)]
    pub truncate: bool,

    /// Dry run mode - run the full pipeline against an in-memory sink
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Repeat the load every MINUTES until interrupted
    #[arg(long, value_name = "MINUTES", value_parser = clap::value_parser!(u64).range(1..))]
    pub every: Option<u64>,

    /// Reload the configuration and load again whenever the file changes
    #[arg(long)]
    pub watch: bool,
}

impl LoadArgs {
    /// Execute the load command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting load command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("{e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        if self.truncate {
            tracing::info!("Enabling truncate from CLI");
            self.apply_truncate(&mut config);
        }

        let tables = match self.select_tables(&config) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, "Invalid table selection");
                eprintln!("{e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        let dry_run = self.dry_run || config.application.dry_run;
        if dry_run {
            tracing::info!("Dry run mode enabled - no data will be written");
            println!("🔍 DRY RUN MODE - No data will be written to the database");
            println!();
        }

        // Confirmation prompt (unless --yes or dry-run)
        if !self.yes && !dry_run && !confirm(&config, &tables)? {
            println!("Load cancelled.");
            return Ok(exit_code::SUCCESS);
        }

        let alerts = match AlertDispatcher::from_config(&config.alerts) {
            Ok(a) => a,
            Err(e) => {
                tracing::error!(error = %e, "Failed to configure alerts");
                eprintln!("Failed to configure alerts: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        let progress = if std::io::stderr().is_terminal() {
            ProgressMode::bars()
        } else {
            ProgressMode::Log
        };

        if dry_run {
            // A fresh in-memory sink per run keeps validation counts per run
            let make_runner = || {
                LoadRunner::new(
                    create_dry_run_sink(),
                    alerts.clone(),
                    progress.clone(),
                    shutdown_signal.clone(),
                )
                .dry_run(true)
            };
            return self
                .run_scheduled(make_runner, config_path, config, tables, shutdown_signal.clone())
                .await;
        }

        let sink = match create_postgres_sink(&config.database) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create database sink");
                eprintln!("Failed to initialize load: {e}");
                return Ok(exit_code::CONFIGURATION);
            }
        };

        let connect_retry = RetryPolicy::new(
            config.load.max_retries,
            Duration::from_millis(config.load.backoff_unit_ms),
        );
        if let Err(e) = check_connectivity(sink.as_ref(), connect_retry).await {
            tracing::error!(error = %e, "Database is unreachable");
            eprintln!("Failed to connect to the database: {e}");
            return Ok(exit_code::CONNECTION);
        }

        let make_runner = || {
            LoadRunner::new(
                Arc::clone(&sink),
                alerts.clone(),
                progress.clone(),
                shutdown_signal.clone(),
            )
        };
        self.run_scheduled(make_runner, config_path, config, tables, shutdown_signal.clone())
            .await
    }

    fn apply_truncate(&self, config: &mut SurgeConfig) {
        config.load.truncate_table = true;
        for table in &mut config.tables {
            table.truncate_table = Some(true);
        }
    }

    /// Tables named with `--table`, or all of them
    fn select_tables(&self, config: &SurgeConfig) -> Result<Vec<TableConfig>, String> {
        if self.table.is_empty() {
            return Ok(config.tables.clone());
        }

        self.table
            .iter()
            .map(|name| {
                config
                    .table(name)
                    .cloned()
                    .ok_or_else(|| format!("Table '{name}' is not configured"))
            })
            .collect()
    }

    /// Re-read the configuration after a change, keeping CLI overrides
    fn reload(&self, config_path: &str) -> Result<(SurgeConfig, Vec<TableConfig>), String> {
        let mut config = load_config(config_path).map_err(|e| e.to_string())?;
        if self.truncate {
            self.apply_truncate(&mut config);
        }
        let tables = self.select_tables(&config)?;
        Ok((config, tables))
    }

    /// Run once, then again every `--every` minutes and on each configuration
    /// change under `--watch`, until a shutdown signal arrives
    ///
    /// A stop between runs returns the last run's exit code.
    async fn run_scheduled<S, F>(
        &self,
        make_runner: F,
        config_path: &str,
        mut config: SurgeConfig,
        mut tables: Vec<TableConfig>,
        mut shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32>
    where
        S: Sink,
        F: Fn() -> LoadRunner<S>,
    {
        let mut watcher = if self.watch {
            match ConfigWatcher::new(config_path) {
                Ok(w) => Some(w),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to watch configuration");
                    eprintln!("{e}");
                    return Ok(exit_code::CONFIGURATION);
                }
            }
        } else {
            None
        };

        let mut run: u64 = 1;
        loop {
            tracing::info!(run, tables = tables.len(), "Executing load");
            println!("🚀 Starting load...");
            println!();

            let report = make_runner().run(&config, &tables).await;
            report.log_summary();
            print_report(&report);
            let code = report.exit_code();

            if code == exit_code::INTERRUPTED || (self.every.is_none() && watcher.is_none()) {
                return Ok(code);
            }

            match (self.every, &watcher) {
                (Some(minutes), Some(_)) => println!(
                    "⏱  Next load in {minutes} minute(s) or when the configuration changes; press Ctrl+C to stop"
                ),
                (Some(minutes), None) => {
                    println!("⏱  Next load in {minutes} minute(s); press Ctrl+C to stop")
                }
                _ => println!("👀 Waiting for configuration changes; press Ctrl+C to stop"),
            }

            let due = self
                .every
                .map(|minutes| Instant::now() + Duration::from_secs(minutes * 60));
            loop {
                let next = tokio::select! {
                    biased;

                    _ = wait_for_shutdown(&mut shutdown_signal) => Wake::Shutdown,
                    _ = next_change(watcher.as_mut()) => Wake::ConfigChanged,
                    _ = next_tick(due) => Wake::Scheduled,
                };

                match next {
                    Wake::Shutdown => {
                        tracing::info!(run, "Shutdown requested between loads");
                        return Ok(code);
                    }
                    Wake::Scheduled => break,
                    Wake::ConfigChanged => match self.reload(config_path) {
                        Ok((new_config, new_tables)) => {
                            tracing::info!(tables = new_tables.len(), "Configuration reloaded");
                            println!("🔄 Configuration changed; reloading");
                            config = new_config;
                            tables = new_tables;
                            break;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Changed configuration is invalid; keeping the previous one");
                            eprintln!("Changed configuration is invalid: {e}");
                        }
                    },
                }
            }
            run += 1;
        }
    }
}

/// What ended the wait between runs
enum Wake {
    Shutdown,
    ConfigChanged,
    Scheduled,
}

async fn next_change(watcher: Option<&mut ConfigWatcher>) {
    match watcher {
        Some(watcher) => watcher.changed().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(due: Option<Instant>) {
    match due {
        Some(due) => tokio::time::sleep_until(due).await,
        None => std::future::pending().await,
    }
}

/// Resolves once the shutdown flag is set; never if the sender is gone
async fn wait_for_shutdown(shutdown_signal: &mut watch::Receiver<bool>) {
    while !*shutdown_signal.borrow_and_update() {
        if shutdown_signal.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn confirm(config: &SurgeConfig, tables: &[TableConfig]) -> anyhow::Result<bool> {
    use std::io::{self, Write};

    println!("Load Configuration:");
    println!("  Batch size: {}", config.load.batch_size);
    println!("  Threads: {}", config.load.num_threads);
    println!("  Max retries: {}", config.load.max_retries);
    println!("  Tables:");
    for table in tables {
        println!(
            "    - {} <- {}{}",
            table.table_name,
            describe_source(&table.source),
            if table.truncate_table.unwrap_or(config.load.truncate_table) {
                " (truncate first)"
            } else {
                ""
            }
        );
    }
    println!();
    print!("Proceed with load? [y/N]: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn describe_source(source: &SourceConfig) -> String {
    match source {
        SourceConfig::File(file) => file.path.display().to_string(),
        SourceConfig::Generator(generator) => {
            format!("{} generated records", generator.num_records)
        }
    }
}

fn print_report(report: &RunReport) {
    println!();
    println!("📊 Load Summary:");
    for summary in &report.summaries {
        println!("  Table: {}", summary.table);
        println!(
            "    Records loaded: {} / {}",
            summary.records_loaded,
            summary
                .total_expected
                .map(|t| t.to_string())
                .unwrap_or_else(|| "?".to_string())
        );
        println!(
            "    Batches: {} succeeded, {} failed",
            summary.batches_succeeded, summary.batches_failed
        );
        if !summary.failed_batches.is_empty() {
            println!("    Failed batches: {:?}", summary.failed_batches);
        }
        println!("    Duration: {:.2}s", summary.duration.as_secs_f64());
        match summary.verdict {
            Some(Verdict::Pass) => println!("    Validation: PASS"),
            Some(Verdict::Mismatch { actual, expected }) => {
                println!("    Validation: MISMATCH (actual {actual}, expected {expected})")
            }
            None => println!("    Validation: skipped"),
        }
        for error in &summary.errors {
            println!("    ⚠️  {:?}: {}", error.error_type, error.message);
            if let Some(context) = &error.context {
                println!("       Context: {context}");
            }
        }
    }
    for failure in &report.failures {
        println!("  Table: {}", failure.table);
        println!("    ❌ Aborted: {}", failure.message);
    }
    println!();

    match report.exit_code() {
        exit_code::SUCCESS => println!("✅ Load completed successfully!"),
        exit_code::INTERRUPTED => {
            println!("⚠️  Load interrupted gracefully. In-flight batches were finished.")
        }
        exit_code::PARTIAL_FAILURE => println!("⚠️  Load completed with failures"),
        _ => println!("❌ Load failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemorySink;
    use crate::config::parse_config;
    use std::sync::Mutex;

    fn args(tables: &[&str]) -> LoadArgs {
        LoadArgs {
            table: tables.iter().map(|t| t.to_string()).collect(),
            truncate: false,
            dry_run: false,
            yes: true,
            every: None,
            watch: false,
        }
    }

    fn config() -> SurgeConfig {
        parse_config(
            r#"
[database]
connection_string = "postgresql://localhost/db"

[[tables]]
table_name = "users"
columns = ["id"]
[tables.source]
type = "generator"
num_records = 3
fields = [{ name = "id", kind = "sequence" }]

[[tables]]
table_name = "orders"
columns = ["id"]
truncate_table = false
[tables.source]
type = "generator"
num_records = 3
fields = [{ name = "id", kind = "sequence" }]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_select_all_tables_by_default() {
        let selected = args(&[]).select_tables(&config()).unwrap();
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_select_named_tables() {
        let selected = args(&["orders"]).select_tables(&config()).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].table_name, "orders");
    }

    #[test]
    fn test_unknown_table_rejected() {
        let err = args(&["missing"]).select_tables(&config()).unwrap_err();
        assert!(err.contains("missing"));
    }

    #[test]
    fn test_truncate_flag_overrides_tables() {
        let mut config = config();
        args(&[]).apply_truncate(&mut config);
        assert!(config.load.truncate_table);
        assert!(config.tables.iter().all(|t| t.truncate_table == Some(true)));
    }

    #[tokio::test]
    async fn test_dry_run_loads_into_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surge.toml");
        std::fs::write(
            &path,
            r#"
[database]
connection_string = "postgresql://localhost/db"

[load]
batch_size = 2

[[tables]]
table_name = "users"
columns = ["id"]
[tables.source]
type = "generator"
num_records = 5
fields = [{ name = "id", kind = "sequence" }]
"#,
        )
        .unwrap();

        let mut args = args(&[]);
        args.dry_run = true;
        let (_tx, rx) = watch::channel(false);
        let code = args.execute(path.to_str().unwrap(), rx).await.unwrap();
        assert_eq!(code, exit_code::SUCCESS);
    }

    #[tokio::test]
    async fn test_missing_config_is_configuration_error() {
        let (_tx, rx) = watch::channel(false);
        let code = args(&[])
            .execute("/nonexistent/surge.toml", rx)
            .await
            .unwrap();
        assert_eq!(code, exit_code::CONFIGURATION);
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_returns_when_signalled() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { wait_for_shutdown(&mut rx).await });
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    const SCHEDULED: &str = r#"
[database]
connection_string = "postgresql://localhost/db"

[load]
batch_size = 2

[[tables]]
table_name = "events"
columns = ["id"]
[tables.source]
type = "generator"
num_records = 5
fields = [{ name = "id", kind = "sequence" }]
"#;

    /// Hands out dry-run runners and raises `stop` when run `stop_at` starts
    struct Runs {
        sinks: Mutex<Vec<Arc<MemorySink>>>,
        runner_shutdown: watch::Receiver<bool>,
        stop: watch::Sender<bool>,
        stop_at: usize,
    }

    impl Runs {
        fn new(runner_shutdown: watch::Receiver<bool>, stop: watch::Sender<bool>, stop_at: usize) -> Self {
            Self {
                sinks: Mutex::new(Vec::new()),
                runner_shutdown,
                stop,
                stop_at,
            }
        }

        fn runner(&self) -> LoadRunner<MemorySink> {
            let sink = Arc::new(MemorySink::new());
            let mut sinks = self.sinks.lock().unwrap();
            sinks.push(Arc::clone(&sink));
            if sinks.len() == self.stop_at {
                self.stop.send_replace(true);
            }
            LoadRunner::new(
                sink,
                AlertDispatcher::default(),
                ProgressMode::Log,
                self.runner_shutdown.clone(),
            )
            .dry_run(true)
        }

        fn rows_per_run(&self) -> Vec<u64> {
            self.sinks
                .lock()
                .unwrap()
                .iter()
                .map(|sink| sink.row_count("events"))
                .collect()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_stops_on_shutdown_between_runs() {
        let config = parse_config(SCHEDULED).unwrap();
        let tables = config.tables.clone();
        let (_runner_tx, runner_shutdown) = watch::channel(false);
        let (stop, stop_rx) = watch::channel(false);
        let runs = Runs::new(runner_shutdown, stop, 2);
        let mut args = args(&[]);
        args.every = Some(5);

        let code = args
            .run_scheduled(|| runs.runner(), "surge.toml", config, tables, stop_rx)
            .await
            .unwrap();

        assert_eq!(code, exit_code::SUCCESS);
        assert_eq!(runs.rows_per_run(), vec![5, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupted_run_ends_the_schedule() {
        let config = parse_config(SCHEDULED).unwrap();
        let tables = config.tables.clone();
        let (_runner_tx, runner_shutdown) = watch::channel(true);
        let (stop, stop_rx) = watch::channel(false);
        let runs = Runs::new(runner_shutdown, stop, 0);
        let mut args = args(&[]);
        args.every = Some(5);

        let code = args
            .run_scheduled(|| runs.runner(), "surge.toml", config, tables, stop_rx)
            .await
            .unwrap();

        assert_eq!(code, exit_code::INTERRUPTED);
        assert_eq!(runs.rows_per_run(), vec![0]);
    }

    #[tokio::test]
    async fn test_watch_reloads_changed_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surge.toml");
        std::fs::write(&path, SCHEDULED).unwrap();
        let config = load_config(&path).unwrap();
        let tables = config.tables.clone();
        let (_runner_tx, runner_shutdown) = watch::channel(false);
        let (stop, stop_rx) = watch::channel(false);
        let runs = Runs::new(runner_shutdown, stop, 2);
        let mut args = args(&[]);
        args.watch = true;

        let rewrite = {
            let path = path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                std::fs::write(&path, SCHEDULED.replace("num_records = 5", "num_records = 7"))
                    .unwrap();
            })
        };

        let scheduled = args.run_scheduled(
            || runs.runner(),
            path.to_str().unwrap(),
            config,
            tables,
            stop_rx,
        );
        let code = tokio::time::timeout(Duration::from_secs(10), scheduled)
            .await
            .expect("reload should trigger a second run")
            .unwrap();
        rewrite.await.unwrap();

        assert_eq!(code, exit_code::SUCCESS);
        assert_eq!(runs.rows_per_run(), vec![5, 7]);
    }

    #[tokio::test]
    async fn test_watch_requires_existing_config() {
        let config = parse_config(SCHEDULED).unwrap();
        let tables = config.tables.clone();
        let (_runner_tx, runner_shutdown) = watch::channel(false);
        let (stop, stop_rx) = watch::channel(false);
        let runs = Runs::new(runner_shutdown, stop, 0);
        let mut args = args(&[]);
        args.watch = true;

        let code = args
            .run_scheduled(|| runs.runner(), "/nonexistent/surge.toml", config, tables, stop_rx)
            .await
            .unwrap();

        assert_eq!(code, exit_code::CONFIGURATION);
        assert!(runs.rows_per_run().is_empty());
    }
}
