//! Core domain types, configuration and errors for otreplay.
//!
//! Everything the pipeline stages share lives here: the record and batch
//! model, the error taxonomy, the cancellation signal and configuration.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod shutdown;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, LogLevel};
pub use error::{DecodeError, OpenError, ReplayError, Result, ScanError, TransportError};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
pub use types::{Batch, ReplayStats, TraceRecord, MAX_BATCH_SIZE};
