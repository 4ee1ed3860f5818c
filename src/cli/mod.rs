//! Command-line interface for otreplay.
//!
//! Point it at a directory of captured OTLP/JSON files and it replays them
//! into the collector: `otreplay --dir ./traces`.

use crate::core::config::ConfigBuilder;
use crate::core::{shutdown_channel, Config, LogLevel, ReplayError, Result};
use crate::replay;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Replay captured OTLP/JSON trace files into an OpenTelemetry collector
#[derive(Parser, Debug)]
#[command(name = "otreplay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to traces
    #[arg(long, env = "OTREPLAY_DIR")]
    pub dir: PathBuf,

    /// Collector OTLP/gRPC endpoint (default: $OTEL_EXPORTER_OTLP_ENDPOINT or http://localhost:4317)
    #[arg(long, env = "OTREPLAY_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Configuration file path (default: ~/.config/otreplay/config.yaml)
    #[arg(short, long, env = "OTREPLAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Deadline for connecting to the collector, e.g. "5s"
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    pub connect_timeout: Option<Duration>,

    /// Records per export request (1-50)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Enable debug logging
    #[arg(short, long, env = "OTREPLAY_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables
    /// 3. Config file
    /// 4. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = if let Some(path) = &self.config {
            path.clone()
        } else {
            let default_path = dirs::config_dir()
                .map(|d| d.join("otreplay").join("config.yaml"))
                .unwrap_or_else(|| PathBuf::from("~/.config/otreplay/config.yaml"));

            if default_path.exists() {
                default_path
            } else {
                return self.build_config_from_args(builder);
            }
        };

        match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => {
                builder = builder.from_yaml(&content)?;
            },
            Err(e) if self.config.is_some() => {
                return Err(ReplayError::config(format!(
                    "Failed to read config file {:?}: {}",
                    config_path, e
                )));
            },
            Err(_) => {},
        }

        self.build_config_from_args(builder)
    }

    fn build_config_from_args(&self, mut builder: ConfigBuilder) -> Result<Config> {
        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint(endpoint.as_str());
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(size) = self.batch_size {
            builder = builder.batch_size(size);
        }

        builder.debug(self.debug).build()
    }

    /// Initialize logging. `RUST_LOG` wins, then `--debug`, then
    /// `OTREPLAY_LOG_LEVEL`, then the configured level.
    pub fn init_logging(&self, configured: LogLevel) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let log_level = if self.debug {
            "debug".to_string()
        } else {
            std::env::var("OTREPLAY_LOG_LEVEL").unwrap_or_else(|_| configured.as_str().to_string())
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false).compact())
            .try_init()
            .map_err(|e| ReplayError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Execute a replay run.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(config.logging.level)?;

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  Endpoint: {}", config.collector.endpoint);
        println!("  Connect timeout: {:?}", config.collector.connect_timeout);
        println!("  Batch size: {}", config.replay.batch_size);
        println!("  Max line bytes: {}", config.replay.max_line_bytes);
        return Ok(());
    }

    let (trigger, shutdown) = shutdown_channel();
    let replay = replay::replay_directory(&config, &cli.dir, shutdown);
    tokio::pin!(replay);

    let result = tokio::select! {
        result = &mut replay => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping...");
            trigger.trigger();
            // Let the pipeline observe cancellation and stop the client.
            replay.await
        }
    };

    match result {
        Ok(stats) => {
            tracing::info!(%stats, "Replay complete");
            Ok(())
        },
        Err(e) => {
            tracing::error!(category = e.category(), "{}", e);
            Err(e)
        },
    }
}
