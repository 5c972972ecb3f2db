//! Record sources
//!
//! A source yields records one at a time, in order, each with exactly as
//! many values as the table has columns. Sources are synchronous; the load
//! engine drives them from a blocking task.

pub mod archive;
pub mod delimited;
pub mod generator;
pub mod json;

use crate::config::schema::{FileFormat, FileSourceConfig, SourceConfig, TableConfig};
use crate::domain::errors::SourceError;
use crate::domain::record::Record;
use crate::domain::Result;
use std::path::Path;

pub use archive::SourceInput;
pub use delimited::{DelimitedOptions, DelimitedSource};
pub use generator::GeneratorSource;
pub use json::{JsonArraySource, JsonLinesSource};

/// A finite, ordered stream of records
pub trait RecordSource: Send {
    /// Next record, or `None` once the source is exhausted
    fn next_record(&mut self) -> Result<Option<Record>>;

    /// Total number of records, when known before exhaustion
    fn total_count(&self) -> Option<u64>;
}

impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    fn next_record(&mut self) -> Result<Option<Record>> {
        (**self).next_record()
    }

    fn total_count(&self) -> Option<u64> {
        (**self).total_count()
    }
}

/// Open the source configured for `table`
pub fn open_source(table: &TableConfig) -> Result<Box<dyn RecordSource>> {
    match &table.source {
        SourceConfig::Generator(config) => Ok(Box::new(GeneratorSource::new(config)?)),
        SourceConfig::File(config) => open_file_source(config, table.columns.clone()),
    }
}

fn open_file_source(
    config: &FileSourceConfig,
    columns: Vec<String>,
) -> Result<Box<dyn RecordSource>> {
    let (input, name) = SourceInput::resolve(&config.path, config.archive_entry.as_deref())?;
    let format = config
        .format
        .or_else(|| FileFormat::from_path(Path::new(&name)))
        .ok_or_else(|| SourceError::UnsupportedFormat(name.clone()))?;

    tracing::info!(
        source = %input.location(),
        format = ?format,
        "Opening file source"
    );

    let delimited = |delimiter: u8| DelimitedOptions {
        delimiter,
        has_header: config.has_header,
        empty_as_null: config.empty_as_null,
        count_total: config.count_total,
    };

    Ok(match format {
        FileFormat::Csv => Box::new(DelimitedSource::open(&input, columns.len(), delimited(b','))?),
        FileFormat::Tsv => {
            Box::new(DelimitedSource::open(&input, columns.len(), delimited(b'\t'))?)
        }
        FileFormat::Json => Box::new(JsonArraySource::open(&input, columns)?),
        FileFormat::Jsonl => Box::new(JsonLinesSource::open(&input, columns, config.count_total)?),
    })
}
