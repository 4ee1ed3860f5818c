//! The replay pipeline: walk, scan, batch, upload.
//!
//! Files are processed one at a time and batches are sent one at a time,
//! so upload order follows walk order and, within a file, line order.

use crate::batch::Batcher;
use crate::core::config::ReplayConfig;
use crate::core::{Config, ReplayError, ReplayStats, Result, Shutdown};
use crate::decode::{JsonRecordDecoder, RecordDecoder};
use crate::scanner::FileScanner;
use crate::transport::{GrpcTransport, TraceTransport};
use crate::uploader::Uploader;
use crate::walker;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Drives one replay run over a directory tree.
#[derive(Debug, Clone)]
pub struct Replayer<D = JsonRecordDecoder> {
    settings: ReplayConfig,
    connect_timeout: Duration,
    decoder: D,
}

impl Replayer {
    /// Replayer decoding OTLP/JSON lines.
    pub fn new(config: &Config) -> Self {
        Self::with_decoder(config, JsonRecordDecoder)
    }
}

impl<D: RecordDecoder + Clone> Replayer<D> {
    /// Replayer with a custom line decoder.
    pub fn with_decoder(config: &Config, decoder: D) -> Self {
        Self {
            settings: config.replay.clone(),
            connect_timeout: config.collector.connect_timeout,
            decoder,
        }
    }

    /// Replay every trace file under `root` through `transport`.
    ///
    /// The session is opened before the first file is touched and stopped
    /// once the walk ends, whether it ended normally or on an error. When
    /// both the walk and the stop fail, the walk's error is returned.
    pub async fn run<T: TraceTransport>(
        &self,
        root: &Path,
        transport: T,
        shutdown: Shutdown,
    ) -> Result<ReplayStats> {
        let mut uploader = Uploader::new(transport, shutdown);
        uploader.open(self.connect_timeout).await?;

        let mut stats = ReplayStats::default();
        let outcome = self.replay_tree(root, &mut uploader, &mut stats).await;
        let closed = uploader.close().await;

        stats.batches_sent = uploader.batches_sent();
        stats.spans_sent = uploader.spans_sent();

        match (outcome, closed) {
            (Ok(()), Ok(())) => Ok(stats),
            (Ok(()), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(stop_err)) => {
                tracing::warn!(error = %stop_err, "Failed to stop client after an earlier error");
                Err(e)
            },
        }
    }

    async fn replay_tree<T: TraceTransport>(
        &self,
        root: &Path,
        uploader: &mut Uploader<T>,
        stats: &mut ReplayStats,
    ) -> Result<()> {
        self.replay_paths(walker::walk(root), uploader, stats).await
    }

    /// Replay files in the order given. A path that can no longer be opened
    /// by the time it is reached is skipped like any other unreadable file.
    async fn replay_paths<T, I>(
        &self,
        paths: I,
        uploader: &mut Uploader<T>,
        stats: &mut ReplayStats,
    ) -> Result<()>
    where
        T: TraceTransport,
        I: IntoIterator<Item = Result<PathBuf>>,
    {
        for path in paths {
            let path = path?;
            self.replay_file(&path, uploader, stats).await?;
        }
        Ok(())
    }

    async fn replay_file<T: TraceTransport>(
        &self,
        path: &Path,
        uploader: &mut Uploader<T>,
        stats: &mut ReplayStats,
    ) -> Result<()> {
        let mut scanner = match FileScanner::open(
            path,
            self.decoder.clone(),
            self.settings.max_line_bytes,
            self.settings.initial_buffer_bytes,
        ) {
            Ok(scanner) => scanner,
            Err(e) => {
                stats.files_skipped += 1;
                tracing::info!(error = %e, "Skipping unreadable trace file");
                return Ok(());
            },
        };

        tracing::info!(path = %path.display(), "Exporting trace");
        stats.files_scanned += 1;

        let mut batcher = Batcher::new(self.settings.batch_size);
        let mut read_error = None;
        for item in scanner.by_ref() {
            match item {
                Ok(record) => {
                    stats.records += 1;
                    if let Some(batch) = batcher.accept(record) {
                        uploader.send(batch).await?;
                    }
                },
                Err(e) => {
                    read_error = Some(e);
                    break;
                },
            }
        }

        let skipped = scanner.skipped();
        stats.lines_skipped += skipped;
        if skipped > 0 {
            tracing::info!(path = %path.display(), skipped, "Skipped malformed lines");
        }

        // Whatever decoded before a read failure is still delivered.
        if let Some(batch) = batcher.finish() {
            uploader.send(batch).await?;
        }

        match read_error {
            Some(source) => Err(ReplayError::Read {
                path: path.to_path_buf(),
                source,
            }),
            None => Ok(()),
        }
    }
}

/// Replay `root` to the collector described by `config` over OTLP/gRPC.
pub async fn replay_directory(config: &Config, root: &Path, shutdown: Shutdown) -> Result<ReplayStats> {
    let transport = GrpcTransport::new(&config.collector);
    tracing::info!(endpoint = transport.endpoint(), root = %root.display(), "Starting replay");
    Replayer::new(config).run(root, transport, shutdown).await
}
