//! Identifier types with validation
//!
//! Table and column names end up interpolated into SQL text, so they are
//! wrapped in newtypes that only accept plain identifiers and always render
//! double-quoted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// PostgreSQL truncates identifiers longer than this
const MAX_IDENTIFIER_LEN: usize = 63;

fn validate_identifier(kind: &str, ident: &str) -> Result<(), String> {
    if ident.is_empty() {
        return Err(format!("{kind} cannot be empty"));
    }
    if ident.len() > MAX_IDENTIFIER_LEN {
        return Err(format!(
            "{kind} '{ident}' exceeds {MAX_IDENTIFIER_LEN} characters"
        ));
    }

    let mut chars = ident.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return Err(format!(
            "{kind} '{ident}' must start with a letter or underscore and contain only letters, digits, '_' or '$'"
        ));
    }
    Ok(())
}

fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

/// Target table name, optionally schema-qualified (`schema.table`)
///
/// # Examples
///
/// ```
/// use surge::domain::ids::TableName;
///
/// let table = TableName::new("public.users").unwrap();
/// assert_eq!(table.quoted(), "\"public\".\"users\"");
/// assert!(TableName::new("users; DROP TABLE x").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName(String);

impl TableName {
    /// Creates a new TableName, rejecting anything but `ident` or `schema.ident`
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() > 2 {
            return Err(format!(
                "Table name '{name}' may have at most one schema qualifier"
            ));
        }
        for part in &parts {
            validate_identifier("Table name", part)?;
        }
        Ok(Self(name))
    }

    /// Returns the table name as written in configuration
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name with every part double-quoted, ready for SQL text
    pub fn quoted(&self) -> String {
        self.0.split('.').map(quote).collect::<Vec<_>>().join(".")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TableName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Target column name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnName(String);

impl ColumnName {
    /// Creates a new ColumnName from a plain identifier
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        validate_identifier("Column name", &name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn quoted(&self) -> String {
        quote(&self.0)
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ColumnName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ColumnName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
