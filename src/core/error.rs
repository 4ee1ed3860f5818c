//! Error types for the replay pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors. Any of these aborts the whole replay run.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// The trace directory could not be traversed.
    #[error("failed to walk traces in {root:?}: {source}")]
    Walk {
        /// Directory the walk started from.
        root: PathBuf,
        /// Underlying traversal failure.
        #[source]
        source: walkdir::Error,
    },

    /// A trace file failed partway through reading.
    #[error("problem reading trace file {path:?}: {source}")]
    Read {
        /// File being read.
        path: PathBuf,
        /// What went wrong in it.
        #[source]
        source: ScanError,
    },

    /// The collector session could not be established.
    #[error("failed to start client: {0}")]
    ConnectionStart(#[source] TransportError),

    /// The collector session was not established before the deadline.
    #[error("failed to start client: no connection within {timeout_ms}ms")]
    StartTimeout {
        /// Deadline that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// An export request was not accepted.
    #[error("failed to upload traces (batch #{batch}): {source}")]
    Transmission {
        /// 1-based sequence number of the failed batch.
        batch: u64,
        /// Transport failure.
        #[source]
        source: TransportError,
    },

    /// The collector session could not be shut down cleanly.
    #[error("failed to stop client: {0}")]
    ConnectionStop(#[source] TransportError),

    /// An operation was attempted in the wrong connection state.
    #[error("connection is {0}, operation not permitted")]
    InvalidState(&'static str),

    /// The run was cancelled before it finished.
    #[error("replay cancelled")]
    Cancelled,

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for replay operations
pub type Result<T> = std::result::Result<T, ReplayError>;

impl ReplayError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Walk { .. } => "walk",
            Self::Read { .. } => "io",
            Self::ConnectionStart(_) | Self::StartTimeout { .. } => "connect",
            Self::Transmission { .. } => "upload",
            Self::ConnectionStop(_) => "shutdown",
            Self::InvalidState(_) => "state",
            Self::Cancelled => "cancelled",
            Self::Config(_) => "config",
        }
    }
}

/// A single line that could not be decoded into a trace record.
///
/// Never fatal: the scanner logs it and moves to the next line.
#[derive(Error, Debug)]
#[error("line {line}: {source}")]
pub struct DecodeError {
    /// 1-based line number.
    pub line: u64,
    /// Parser error.
    #[source]
    pub source: serde_json::Error,
}

/// A trace file that could not be opened. The walker skips the file.
#[derive(Error, Debug)]
#[error("cannot open {path:?}: {source}")]
pub struct OpenError {
    /// File that could not be opened.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: std::io::Error,
}

/// Failures while splitting a file into lines.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A line is longer than the configured limit.
    #[error("line {line} exceeds the {limit} byte limit")]
    LineTooLong {
        /// 1-based number of the offending line.
        line: u64,
        /// Limit in bytes, terminator excluded.
        limit: usize,
    },

    /// The underlying reader failed.
    #[error("read failed after line {line}: {source}")]
    Io {
        /// Last line read successfully.
        line: u64,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported by the wire client.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The configured endpoint is not a usable URI.
    #[error("invalid collector endpoint {endpoint:?}: {message}")]
    InvalidEndpoint {
        /// Endpoint as configured.
        endpoint: String,
        /// Why it was rejected.
        message: String,
    },

    /// Dialing the collector failed.
    #[error("connection failed: {0}")]
    Connect(#[from] tonic::transport::Error),

    /// The collector answered with a non-OK status.
    #[error("GRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    /// No session is open.
    #[error("client is not connected")]
    NotConnected,
}
