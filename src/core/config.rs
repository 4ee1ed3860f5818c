//! Configuration management for otreplay.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Environment variable defaults for the collector endpoint
//! - CLI argument overrides
//! - Validation and defaults

use crate::core::types::MAX_BATCH_SIZE;
use crate::core::{ReplayError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default collector address of the OTLP gRPC exporter.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4317";

/// Complete configuration for a replay run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collector connection settings
    pub collector: CollectorConfig,
    /// File scanning and batching settings
    pub replay: ReplayConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Collector connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// OTLP gRPC endpoint, e.g. `http://localhost:4317`
    pub endpoint: String,
    /// Deadline for establishing the connection
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Optional per-export deadline; unset means only cancellation bounds an upload
    #[serde(with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
}

/// Scanning and batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Records per export call
    pub batch_size: usize,
    /// Longest accepted line, in bytes
    pub max_line_bytes: usize,
    /// Starting capacity of the line buffer
    pub initial_buffer_bytes: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Adds skipped-line details.
    Debug,
    /// Progress per file (default).
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            endpoint: endpoint_from_env().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            connect_timeout: Duration::from_secs(5),
            request_timeout: None,
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            batch_size: MAX_BATCH_SIZE,
            max_line_bytes: 1024 * 1024 * 1024, // 1 GiB
            initial_buffer_bytes: 1024 * 1024,  // 1 MiB
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
        }
    }
}

/// Endpoint from the standard OTLP exporter variables, traces-specific first.
fn endpoint_from_env() -> Option<String> {
    ["OTEL_EXPORTER_OTLP_TRACES_ENDPOINT", "OTEL_EXPORTER_OTLP_ENDPOINT"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.collector.endpoint.trim().is_empty() {
            return Err(ReplayError::config("collector endpoint must not be empty"));
        }

        if self.collector.connect_timeout.is_zero() {
            return Err(ReplayError::config("connect_timeout must be greater than 0"));
        }

        if matches!(self.collector.request_timeout, Some(t) if t.is_zero()) {
            return Err(ReplayError::config("request_timeout must be greater than 0 when set"));
        }

        if self.replay.batch_size == 0 || self.replay.batch_size > MAX_BATCH_SIZE {
            return Err(ReplayError::config(format!(
                "batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.replay.batch_size
            )));
        }

        if self.replay.max_line_bytes == 0 {
            return Err(ReplayError::config("max_line_bytes must be greater than 0"));
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| ReplayError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set collector endpoint
    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.config.collector.endpoint = endpoint.into();
        self
    }

    /// Set connection deadline
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.collector.connect_timeout = timeout;
        self
    }

    /// Set per-export deadline
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.collector.request_timeout = timeout;
        self
    }

    /// Set records per batch
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.replay.batch_size = size;
        self
    }

    /// Set maximum line length
    pub fn max_line_bytes(mut self, bytes: usize) -> Self {
        self.config.replay.max_line_bytes = bytes;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
