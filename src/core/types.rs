//! Data model shared by the replay pipeline.

use opentelemetry_proto::tonic::trace::v1::ResourceSpans;
use std::fmt;

/// Upper bound on records per transmitted batch.
pub const MAX_BATCH_SIZE: usize = 50;

/// One decoded line: spans grouped under a single resource.
pub type TraceRecord = ResourceSpans;

/// An ordered, non-empty group of records sent in a single export call.
///
/// Only [`crate::batch::Batcher`] creates batches, which keeps the
/// `1..=MAX_BATCH_SIZE` length invariant in one place.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    records: Vec<TraceRecord>,
}

impl Batch {
    /// Wraps records that are known to satisfy the length invariant.
    pub(crate) fn new(records: Vec<TraceRecord>) -> Self {
        debug_assert!(!records.is_empty() && records.len() <= MAX_BATCH_SIZE);
        Self { records }
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false for a batch produced by the batcher.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total spans across all records.
    pub fn span_count(&self) -> usize {
        self.records
            .iter()
            .flat_map(|rs| rs.scope_spans.iter())
            .map(|ss| ss.spans.len())
            .sum()
    }

    /// Borrow the records in insertion order.
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// Consume the batch, handing the records to the transport.
    pub fn into_records(self) -> Vec<TraceRecord> {
        self.records
    }
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Files that were opened and scanned
    pub files_scanned: u64,
    /// Files skipped because they could not be opened
    pub files_skipped: u64,
    /// Records successfully decoded
    pub records: u64,
    /// Lines skipped because they failed to decode
    pub lines_skipped: u64,
    /// Batches delivered to the collector
    pub batches_sent: u64,
    /// Spans delivered to the collector
    pub spans_sent: u64,
}

impl fmt::Display for ReplayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files ({} skipped), {} records ({} lines skipped), {} batches, {} spans",
            self.files_scanned,
            self.files_skipped,
            self.records,
            self.lines_skipped,
            self.batches_sent,
            self.spans_sent
        )
    }
}
