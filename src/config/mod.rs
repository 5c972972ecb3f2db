//! Configuration management for Surge.
//!
//! Surge reads a TOML file (default `surge.toml`) with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `SURGE_<SECTION>_<KEY>` overrides applied after parsing
//! - Default values for optional settings
//! - Validation of every section before anything runs
//!
//! # Example Configuration
//!
//! ```toml
//! [database]
//! connection_string = "${SURGE_DATABASE_URL}"
//!
//! [load]
//! batch_size = 5000
//! num_threads = 8
//! max_retries = 3
//!
//! [alerts]
//! slack_token = "${SURGE_SLACK_TOKEN}"
//! slack_channel = "#data-loads"
//!
//! [[tables]]
//! table_name = "public.customers"
//! columns = ["id", "name", "email"]
//!
//! [tables.source]
//! type = "file"
//! path = "data/customers.csv.gz"
//! ```
//!
//! Configuration is validated on load:
//!
//! ```rust,no_run
//! use surge::config::load_config;
//!
//! match load_config("surge.toml") {
//!     Ok(config) => println!("{} table(s) configured", config.tables.len()),
//!     Err(e) => eprintln!("Configuration error: {}", e),
//! }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;
pub mod watch;

pub use loader::{load_config, parse_config, DEFAULT_CONFIG_PATH};
pub use schema::{
    AlertsConfig, ApplicationConfig, DatabaseConfig, FieldKind, FieldSpec, FileFormat,
    FileSourceConfig, GeneratorConfig, LoadConfig, LoggingConfig, SourceConfig, SurgeConfig,
    TableConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
pub use watch::ConfigWatcher;
