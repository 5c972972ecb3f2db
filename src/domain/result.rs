//! Result type alias for Surge
//!
//! This module provides a convenient Result type alias that uses SurgeError
//! as the error type.

use super::errors::SurgeError;

/// Result type alias for Surge operations
///
/// # Examples
///
/// ```
/// use surge::domain::result::Result;
/// use surge::domain::errors::SurgeError;
///
/// fn parse_batch_size(raw: &str) -> Result<usize> {
///     raw.parse()
///         .map_err(|_| SurgeError::Validation(format!("not a batch size: {raw}")))
/// }
///
/// assert_eq!(parse_batch_size("500").unwrap(), 500);
/// assert!(parse_batch_size("lots").is_err());
/// ```
pub type Result<T> = std::result::Result<T, SurgeError>;
