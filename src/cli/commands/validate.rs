//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Surge configuration file.

use crate::config::{load_config, AlertsConfig, SourceConfig};
use crate::core::load::exit_code;
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // Loading also runs validation
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(exit_code::CONFIGURATION);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!(
            "  Database: {}",
            redact_connection_string(config.database.connection_string.expose_secret())
        );
        println!("  SSL Mode: {}", config.database.ssl_mode);
        println!(
            "  Pool Size: {}",
            config
                .database
                .pool_size
                .unwrap_or(config.load.num_threads)
        );
        println!("  Batch Size: {}", config.load.batch_size);
        println!("  Threads: {}", config.load.num_threads);
        println!("  Max Retries: {}", config.load.max_retries);
        println!("  Backoff Unit: {}ms", config.load.backoff_unit_ms);
        println!("  Alerts: {}", describe_alerts(&config.alerts));
        println!("  Tables:");
        for table in &config.tables {
            let source = match &table.source {
                SourceConfig::File(file) => format!(
                    "file {} ({})",
                    file.path.display(),
                    file.resolved_format()
                        .map(|f| format!("{f:?}").to_lowercase())
                        .unwrap_or_else(|| "archive entry".to_string())
                ),
                SourceConfig::Generator(generator) => {
                    format!("generator, {} records", generator.num_records)
                }
            };
            println!(
                "    - {} [{}] <- {}",
                table.table_name,
                table.columns.join(", "),
                source
            );
        }
        println!();
        Ok(exit_code::SUCCESS)
    }
}

/// Keep only the part of a connection string after the credentials
fn redact_connection_string(conn: &str) -> &str {
    conn.split('@').next_back().unwrap_or("***")
}

fn describe_alerts(alerts: &AlertsConfig) -> String {
    if !alerts.enabled {
        return "disabled".to_string();
    }
    let mut targets = vec!["log".to_string()];
    if let Some(channel) = &alerts.slack_channel {
        targets.push(format!("slack ({channel})"));
    }
    if let Some(to) = &alerts.email_to {
        targets.push(format!("email ({to})"));
    }
    targets.join(" + ")
}
