//! JSON array and JSON Lines record sources
//!
//! Objects are mapped onto the column list by key. Keys missing from an
//! object load as NULL; keys not named by a column are ignored.

use super::archive::SourceInput;
use super::RecordSource;
use crate::domain::errors::SourceError;
use crate::domain::record::{Record, Value};
use crate::domain::Result;
use serde_json::Map;
use std::io::{BufRead, BufReader, Read};

fn object_to_record(
    value: serde_json::Value,
    columns: &[String],
    location: impl FnOnce() -> String,
) -> Result<Record> {
    let mut object: Map<String, serde_json::Value> = match value {
        serde_json::Value::Object(object) => object,
        other => {
            return Err(SourceError::MalformedRecord {
                location: location(),
                message: format!("expected a JSON object, found {}", json_kind(&other)),
            }
            .into())
        }
    };

    let values = columns
        .iter()
        .map(|column| object.remove(column).map(Value::from_json).unwrap_or(Value::Null))
        .collect();
    Ok(Record::new(values))
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// A file holding one top-level JSON array of objects
///
/// The array is parsed up front, so the total is always known.
pub struct JsonArraySource {
    items: std::vec::IntoIter<serde_json::Value>,
    columns: Vec<String>,
    location: String,
    index: usize,
    total: u64,
}

impl JsonArraySource {
    pub fn open(input: &SourceInput, columns: Vec<String>) -> Result<Self> {
        let location = input.location();
        let items: Vec<serde_json::Value> =
            serde_json::from_reader(input.open()?).map_err(|e| SourceError::MalformedRecord {
                location: location.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            total: items.len() as u64,
            items: items.into_iter(),
            columns,
            location,
            index: 0,
        })
    }
}

impl RecordSource for JsonArraySource {
    fn next_record(&mut self) -> Result<Option<Record>> {
        let Some(item) = self.items.next() else {
            return Ok(None);
        };
        let index = self.index;
        self.index += 1;
        let location = &self.location;
        object_to_record(item, &self.columns, || format!("{location} element {index}")).map(Some)
    }

    fn total_count(&self) -> Option<u64> {
        Some(self.total)
    }
}

/// One JSON object per line; blank lines are skipped
pub struct JsonLinesSource {
    reader: BufReader<Box<dyn Read + Send>>,
    buffer: String,
    columns: Vec<String>,
    location: String,
    line: u64,
    total: Option<u64>,
}

impl JsonLinesSource {
    pub fn open(input: &SourceInput, columns: Vec<String>, count_total: bool) -> Result<Self> {
        let location = input.location();
        let total = if count_total {
            Some(count_lines(input)?)
        } else {
            None
        };

        Ok(Self {
            reader: BufReader::new(input.open()?),
            buffer: String::new(),
            columns,
            location,
            line: 0,
            total,
        })
    }

    fn read_failed(&self, err: std::io::Error) -> SourceError {
        SourceError::ReadFailed {
            path: self.location.clone(),
            message: err.to_string(),
        }
    }
}

fn count_lines(input: &SourceInput) -> Result<u64> {
    let reader = BufReader::new(input.open()?);
    let mut count = 0u64;
    for line in reader.lines() {
        let line = line.map_err(|e| SourceError::ReadFailed {
            path: input.location(),
            message: e.to_string(),
        })?;
        if !line.trim().is_empty() {
            count += 1;
        }
    }
    tracing::debug!(source = %input.location(), rows = count, "Counted source lines");
    Ok(count)
}

impl RecordSource for JsonLinesSource {
    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            self.buffer.clear();
            let read = self
                .reader
                .read_line(&mut self.buffer)
                .map_err(|e| self.read_failed(e))?;
            if read == 0 {
                return Ok(None);
            }
            self.line += 1;

            let text = self.buffer.trim();
            if text.is_empty() {
                continue;
            }

            let location = format!("{} line {}", self.location, self.line);
            let value: serde_json::Value =
                serde_json::from_str(text).map_err(|e| SourceError::MalformedRecord {
                    location: location.clone(),
                    message: e.to_string(),
                })?;
            return object_to_record(value, &self.columns, || location).map(Some);
        }
    }

    fn total_count(&self) -> Option<u64> {
        self.total
    }
}
