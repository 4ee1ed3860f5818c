//! Batch accumulation.
//!
//! Records are appended to one open batch. The batch is emitted as soon as
//! it holds `batch_size` records, and whatever remains is emitted by
//! [`Batcher::finish`] at the end of each file. Batches never span files.

use crate::core::{Batch, TraceRecord, MAX_BATCH_SIZE};

/// Groups records into batches of at most `batch_size`.
#[derive(Debug)]
pub struct Batcher {
    open: Vec<TraceRecord>,
    batch_size: usize,
}

impl Default for Batcher {
    fn default() -> Self {
        Self::new(MAX_BATCH_SIZE)
    }
}

impl Batcher {
    /// Create a batcher. `batch_size` is clamped to `1..=MAX_BATCH_SIZE`.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        Self {
            open: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    /// Append a record, returning a full batch once the threshold is reached.
    pub fn accept(&mut self, record: TraceRecord) -> Option<Batch> {
        self.open.push(record);
        if self.open.len() >= self.batch_size {
            self.take()
        } else {
            None
        }
    }

    /// Emit the partially filled batch, if any. Call at end of input.
    pub fn finish(&mut self) -> Option<Batch> {
        self.take()
    }

    /// Records waiting in the open batch.
    pub fn pending(&self) -> usize {
        self.open.len()
    }

    fn take(&mut self) -> Option<Batch> {
        if self.open.is_empty() {
            return None;
        }
        let records = std::mem::replace(&mut self.open, Vec::with_capacity(self.batch_size));
        Some(Batch::new(records))
    }
}
