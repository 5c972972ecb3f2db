//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::SurgeConfig;
use super::secret::secret_string;
use crate::domain::errors::SurgeError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "surge.toml";

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`SurgeConfig`]
/// 4. Applies environment variable overrides (`SURGE_*` prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`SurgeError::Configuration`] if the file is missing or
/// unreadable, a referenced variable is unset, parsing fails or validation
/// fails.
///
/// # Examples
///
/// ```no_run
/// use surge::config::loader::load_config;
///
/// let config = load_config("surge.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<SurgeConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(SurgeError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        SurgeError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Same as [`load_config`] but from an in-memory document
pub fn parse_config(contents: &str) -> Result<SurgeConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: SurgeConfig = toml::from_str(&contents)
        .map_err(|e| SurgeError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        SurgeError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are left untouched so documented placeholders don't have to
/// be set.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| SurgeError::Other(format!("invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(SurgeError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_override<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        SurgeError::Configuration(format!("Invalid value '{raw}' for {name}"))
    })
}

/// Applies environment variable overrides using the `SURGE_*` prefix
///
/// Variables follow the pattern `SURGE_<SECTION>_<KEY>`, for example
/// `SURGE_LOAD_BATCH_SIZE` or `SURGE_DATABASE_CONNECTION_STRING`. A value
/// that doesn't parse is a configuration error rather than silently ignored.
fn apply_env_overrides(config: &mut SurgeConfig) -> Result<()> {
    let var = |name: &str| std::env::var(name).ok();

    // Application overrides
    if let Some(val) = var("SURGE_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = var("SURGE_APPLICATION_DRY_RUN") {
        config.application.dry_run = parse_override("SURGE_APPLICATION_DRY_RUN", &val)?;
    }

    // Database overrides
    if let Some(val) = var("SURGE_DATABASE_CONNECTION_STRING") {
        config.database.connection_string = secret_string(val);
    }
    if let Some(val) = var("SURGE_DATABASE_POOL_SIZE") {
        config.database.pool_size = Some(parse_override("SURGE_DATABASE_POOL_SIZE", &val)?);
    }
    if let Some(val) = var("SURGE_DATABASE_SSL_MODE") {
        config.database.ssl_mode = val;
    }

    // Load overrides
    if let Some(val) = var("SURGE_LOAD_BATCH_SIZE") {
        config.load.batch_size = parse_override("SURGE_LOAD_BATCH_SIZE", &val)?;
    }
    if let Some(val) = var("SURGE_LOAD_NUM_THREADS") {
        config.load.num_threads = parse_override("SURGE_LOAD_NUM_THREADS", &val)?;
    }
    if let Some(val) = var("SURGE_LOAD_MAX_RETRIES") {
        config.load.max_retries = parse_override("SURGE_LOAD_MAX_RETRIES", &val)?;
    }
    if let Some(val) = var("SURGE_LOAD_BACKOFF_UNIT_MS") {
        config.load.backoff_unit_ms = parse_override("SURGE_LOAD_BACKOFF_UNIT_MS", &val)?;
    }

    // Alert overrides
    if let Some(val) = var("SURGE_ALERTS_ENABLED") {
        config.alerts.enabled = parse_override("SURGE_ALERTS_ENABLED", &val)?;
    }
    if let Some(val) = var("SURGE_ALERTS_SLACK_TOKEN") {
        config.alerts.slack_token = Some(secret_string(val));
    }
    if let Some(val) = var("SURGE_ALERTS_SLACK_CHANNEL") {
        config.alerts.slack_channel = Some(val);
    }
    if let Some(val) = var("SURGE_ALERTS_EMAIL_TO") {
        config.alerts.email_to = Some(val);
    }
    if let Some(val) = var("SURGE_ALERTS_SMTP_SERVER") {
        config.alerts.smtp_server = Some(val);
    }

    // Logging overrides
    if let Some(val) = var("SURGE_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_override("SURGE_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = var("SURGE_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
