//! File scanning: split a trace file into lines and decode each one.
//!
//! [`LineReader`] enforces the per-line size bound; [`FileScanner`] layers
//! the decoder on top and drops lines that fail to decode. A bad line never
//! ends the file. An oversized line or an I/O failure does, and is handed
//! back to the caller as a [`ScanError`].

use crate::core::{OpenError, ScanError, TraceRecord};
use crate::decode::RecordDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Yields newline-delimited lines with the terminator (`\n` or `\r\n`) removed.
pub struct LineReader<R> {
    reader: R,
    max_line_bytes: usize,
    buf: Vec<u8>,
    line_no: u64,
    done: bool,
}

impl<R: BufRead> LineReader<R> {
    /// Create a reader that rejects lines longer than `max_line_bytes`.
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Self::with_capacity(reader, max_line_bytes, 0)
    }

    /// Same as [`LineReader::new`] with a pre-sized line buffer.
    pub fn with_capacity(reader: R, max_line_bytes: usize, capacity: usize) -> Self {
        Self {
            reader,
            max_line_bytes,
            buf: Vec::with_capacity(capacity.min(max_line_bytes)),
            line_no: 0,
            done: false,
        }
    }

    /// Read the next line into the internal buffer, returning it with its
    /// 1-based line number.
    ///
    /// Returns `Ok(None)` at end of input. After an error the reader is
    /// exhausted.
    pub fn next_line(&mut self) -> Result<Option<(u64, &[u8])>, ScanError> {
        if self.done {
            return Ok(None);
        }
        self.buf.clear();

        // Room for "\r\n" past the limit; the terminator never counts.
        let limit = u64::try_from(self.max_line_bytes)
            .unwrap_or(u64::MAX)
            .saturating_add(2);
        let read = match self
            .reader
            .by_ref()
            .take(limit)
            .read_until(b'\n', &mut self.buf)
        {
            Ok(n) => n,
            Err(source) => {
                self.done = true;
                return Err(ScanError::Io {
                    line: self.line_no,
                    source,
                });
            },
        };

        if read == 0 {
            self.done = true;
            return Ok(None);
        }

        self.line_no += 1;
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        if self.buf.len() > self.max_line_bytes {
            self.done = true;
            return Err(ScanError::LineTooLong {
                line: self.line_no,
                limit: self.max_line_bytes,
            });
        }

        Ok(Some((self.line_no, &self.buf)))
    }
}

/// Lazily decodes the records of one trace file.
///
/// Iterates `Result<TraceRecord, ScanError>`. Decode failures are absorbed
/// (counted in [`FileScanner::skipped`]); the first `Err` ends the file.
pub struct FileScanner<R, D> {
    lines: LineReader<R>,
    decoder: D,
    skipped: u64,
}

impl<D: RecordDecoder> FileScanner<BufReader<File>, D> {
    /// Open `path` for scanning.
    pub fn open(
        path: &Path,
        decoder: D,
        max_line_bytes: usize,
        initial_buffer_bytes: usize,
    ) -> Result<Self, OpenError> {
        let file = File::open(path).map_err(|source| OpenError {
            path: path.to_path_buf(),
            source,
        })?;
        let lines = LineReader::with_capacity(
            BufReader::new(file),
            max_line_bytes,
            initial_buffer_bytes,
        );
        Ok(Self::from_lines(lines, decoder))
    }
}

impl<R: BufRead, D: RecordDecoder> FileScanner<R, D> {
    /// Scan an arbitrary buffered reader.
    pub fn new(reader: R, decoder: D, max_line_bytes: usize) -> Self {
        Self::from_lines(LineReader::new(reader, max_line_bytes), decoder)
    }

    fn from_lines(lines: LineReader<R>, decoder: D) -> Self {
        Self {
            lines,
            decoder,
            skipped: 0,
        }
    }

    /// Lines dropped so far because they failed to decode.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<R: BufRead, D: RecordDecoder> Iterator for FileScanner<R, D> {
    type Item = Result<TraceRecord, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (line_no, line) = match self.lines.next_line() {
                Ok(Some(next)) => next,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };

            match self.decoder.decode(line_no, line) {
                Ok(record) => return Some(Ok(record)),
                Err(e) => {
                    self.skipped += 1;
                    tracing::debug!(error = %e, "Skipping malformed line");
                },
            }
        }
    }
}
