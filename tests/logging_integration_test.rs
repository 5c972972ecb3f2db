//! Integration tests for logging
//!
//! A process can install only one global subscriber, so everything that
//! initializes logging lives in a single test.

use surge::config::LoggingConfig;
use surge::logging::init_logging;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(!config.local_enabled);
    assert_eq!(config.local_path, "logs");
    assert_eq!(config.local_rotation, "daily");
}

#[test]
fn test_file_logging_writes_json() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
    };

    assert!(init_logging("verbose", &config).is_err());

    let guard = init_logging("info", &config).expect("Failed to initialize logging");
    tracing::info!(target: "surge::tests", table = "users", records = 42, "Batch loaded");
    drop(guard);

    // A second global subscriber is refused
    assert!(init_logging("info", &LoggingConfig::default()).is_err());

    let content = std::fs::read_to_string(log_path.join("surge.log")).unwrap();
    let line = content
        .lines()
        .find(|l| l.contains("Batch loaded"))
        .expect("event written to the log file");
    let json: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(json["fields"]["table"], "users");
    assert_eq!(json["fields"]["records"], 42);
}
