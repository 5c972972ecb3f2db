//! Domain error types
//!
//! This module defines the error hierarchy for Surge. All errors are
//! domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main Surge error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum SurgeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Record source errors (missing file, malformed rows)
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Sink (database) errors
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// The connection pool could not hand out a connection
    #[error("Connection pool unavailable: {0}")]
    PoolUnavailable(String),

    /// Alert delivery errors
    #[error("Alert delivery error: {0}")]
    Alert(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl SurgeError {
    /// Whether a batch attempt that failed with this error may be retried
    ///
    /// Pool unavailability is never retried: without a connection there is
    /// nothing to retry against.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SurgeError::Sink(_))
    }
}

/// Record source errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// Source file does not exist
    #[error("Source file not found: {0}")]
    NotFound(String),

    /// Source could not be opened or read
    #[error("Failed to read source {path}: {message}")]
    ReadFailed { path: String, message: String },

    /// A row could not be parsed
    #[error("Malformed record at {location}: {message}")]
    MalformedRecord { location: String, message: String },

    /// Row width doesn't match the configured column list
    #[error("Record at {location} has {actual} fields, expected {expected}")]
    WidthMismatch {
        location: String,
        expected: usize,
        actual: usize,
    },

    /// Archive has no usable entry
    #[error("Archive {0} contains no data file")]
    EmptyArchive(String),

    /// Format not supported
    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),
}

/// Sink (database) errors
///
/// These errors don't expose the database driver's types.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Failed to connect to the sink
    #[error("Failed to connect: {0}")]
    ConnectionFailed(String),

    /// Transaction control (BEGIN/COMMIT/ROLLBACK) failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Insert statement failed
    #[error("Insert failed: {message}")]
    InsertFailed {
        message: String,
        code: Option<String>,
    },

    /// Row count query failed
    #[error("Count query failed: {0}")]
    CountFailed(String),

    /// Truncate failed
    #[error("Truncate failed: {0}")]
    TruncateFailed(String),

    /// Value could not be encoded for the target column
    #[error("Failed to encode value: {0}")]
    Encoding(String),
}

/// SQLSTATE classes treated as transient: connection exceptions (08),
/// transaction rollback (40) and operator intervention (57)
const TRANSIENT_SQLSTATE_CLASSES: [&str; 3] = ["08", "40", "57"];

impl SinkError {
    /// Whether the failure looks transient (lock contention, dropped
    /// connection, serialization conflict)
    ///
    /// Every sink error is retried within the batch retry budget; this only
    /// distinguishes transient faults in logs and alerts.
    pub fn is_transient(&self) -> bool {
        match self {
            SinkError::ConnectionFailed(_) | SinkError::TransactionFailed(_) => true,
            SinkError::InsertFailed {
                code: Some(code), ..
            } => TRANSIENT_SQLSTATE_CLASSES
                .iter()
                .any(|class| code.starts_with(class)),
            _ => false,
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for SurgeError {
    fn from(err: std::io::Error) -> Self {
        SurgeError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for SurgeError {
    fn from(err: serde_json::Error) -> Self {
        SurgeError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for SurgeError {
    fn from(err: toml::de::Error) -> Self {
        SurgeError::Configuration(format!("TOML parse error: {err}"))
    }
}
