//! otreplay - replay captured OpenTelemetry traces into a collector.
//!
//! otreplay walks a directory of trace files, each holding one OTLP/JSON
//! `ResourceSpans` object per line (the format written by the collector's
//! file exporter), and re-sends them to a collector over OTLP/gRPC.
//!
//! # Pipeline
//!
//! - `walker`: enumerates regular files under the root, in name order
//! - `scanner`: splits a file into lines and decodes them, skipping bad lines
//! - `batch`: groups records into export-sized batches, per file
//! - `uploader`: owns the collector session and sends batches in order
//! - `transport`: the OTLP/gRPC client
//! - `replay`: wires the stages together
//!
//! Malformed lines and unopenable files are skipped. Everything else,
//! including any failed upload, ends the run.
//!
//! # Example
//!
//! ```no_run
//! use otreplay_lib::core::{Config, Shutdown};
//! use otreplay_lib::replay::replay_directory;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new()?;
//!     let stats = replay_directory(&config, Path::new("./traces"), Shutdown::never()).await?;
//!     println!("{}", stats);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod batch;
pub mod cli;
pub mod core;
pub mod decode;
pub mod replay;
pub mod scanner;
pub mod transport;
pub mod uploader;
pub mod walker;

// Re-export core types for convenience
pub use crate::core::{Config, ReplayError, Result};
pub use crate::replay::{replay_directory, Replayer};
