//! Groups source records into fixed-size batches

use crate::adapters::source::RecordSource;
use crate::domain::record::Batch;
use crate::domain::Result;

/// Iterator of batches over a record source
///
/// Every batch holds exactly `batch_size` records except possibly the last.
/// Sequence numbers start at 1. After a source error the iterator yields
/// that error once and then stops.
pub struct Batcher<S> {
    source: S,
    batch_size: usize,
    next_sequence: u64,
    records_emitted: u64,
    exhausted: bool,
    failed: bool,
}

impl<S: RecordSource> Batcher<S> {
    pub fn new(source: S, batch_size: usize) -> Self {
        Self {
            source,
            batch_size: batch_size.max(1),
            next_sequence: 1,
            records_emitted: 0,
            exhausted: false,
            failed: false,
        }
    }

    /// Records handed out in batches so far
    pub fn records_emitted(&self) -> u64 {
        self.records_emitted
    }

    /// Whether the source ran to its end without error
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: RecordSource> Iterator for Batcher<S> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted || self.failed {
            return None;
        }

        let mut records = Vec::with_capacity(self.batch_size);
        while records.len() < self.batch_size {
            match self.source.next_record() {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {
                    self.exhausted = true;
                    break;
                }
                Err(e) => {
                    // Records read before the error are dropped with it
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }

        if records.is_empty() {
            return None;
        }

        let batch = Batch::new(self.next_sequence, records);
        self.next_sequence += 1;
        self.records_emitted += batch.len() as u64;
        Some(Ok(batch))
    }
}
