//! CSV and TSV record source

use super::archive::SourceInput;
use super::RecordSource;
use crate::domain::errors::SourceError;
use crate::domain::record::{Record, Value};
use crate::domain::Result;
use std::io::Read;

/// Reads delimited rows as text values
///
/// Values stay text here; the sink converts them to each column's type.
pub struct DelimitedSource {
    reader: csv::Reader<Box<dyn Read + Send>>,
    row: csv::StringRecord,
    width: usize,
    empty_as_null: bool,
    total: Option<u64>,
    location: String,
}

/// Options for [`DelimitedSource`]
#[derive(Debug, Clone, Copy)]
pub struct DelimitedOptions {
    pub delimiter: u8,
    pub has_header: bool,
    pub empty_as_null: bool,
    pub count_total: bool,
}

fn reader_builder(options: &DelimitedOptions) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(options.delimiter)
        .has_headers(options.has_header)
        // Width is checked against the column list, not the first row
        .flexible(true);
    builder
}

impl DelimitedSource {
    /// Open `input`, optionally counting its rows first
    pub fn open(input: &SourceInput, width: usize, options: DelimitedOptions) -> Result<Self> {
        let location = input.location();
        let total = if options.count_total {
            Some(count_rows(input, &options)?)
        } else {
            None
        };

        Ok(Self {
            reader: reader_builder(&options).from_reader(input.open()?),
            row: csv::StringRecord::new(),
            width,
            empty_as_null: options.empty_as_null,
            total,
            location,
        })
    }

    fn position(&self) -> String {
        match self.row.position() {
            Some(pos) => format!("{} line {}", self.location, pos.line()),
            None => self.location.clone(),
        }
    }
}

fn count_rows(input: &SourceInput, options: &DelimitedOptions) -> Result<u64> {
    let mut reader = reader_builder(options).from_reader(input.open()?);
    let mut row = csv::ByteRecord::new();
    let mut count = 0u64;
    loop {
        match reader.read_byte_record(&mut row) {
            Ok(true) => count += 1,
            Ok(false) => break,
            Err(e) => {
                return Err(SourceError::MalformedRecord {
                    location: input.location(),
                    message: e.to_string(),
                }
                .into())
            }
        }
    }
    tracing::debug!(source = %input.location(), rows = count, "Counted source rows");
    Ok(count)
}

impl RecordSource for DelimitedSource {
    fn next_record(&mut self) -> Result<Option<Record>> {
        let more = self.reader.read_record(&mut self.row).map_err(|e| {
            SourceError::MalformedRecord {
                location: self.location.clone(),
                message: e.to_string(),
            }
        })?;
        if !more {
            return Ok(None);
        }

        if self.row.len() != self.width {
            return Err(SourceError::WidthMismatch {
                location: self.position(),
                expected: self.width,
                actual: self.row.len(),
            }
            .into());
        }

        let values = self
            .row
            .iter()
            .map(|field| {
                if field.is_empty() && self.empty_as_null {
                    Value::Null
                } else {
                    Value::Text(field.to_string())
                }
            })
            .collect();
        Ok(Some(Record::new(values)))
    }

    fn total_count(&self) -> Option<u64> {
        self.total
    }
}
