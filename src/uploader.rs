//! Upload coordination: owns the collector session for one run.
//!
//! The connection moves `Unstarted -> Started -> Stopped` and never back.
//! Every network step races the run's [`Shutdown`] signal, so a cancelled
//! run unwinds instead of waiting on the collector. A failed send is fatal;
//! nothing is retried.

use crate::core::{Batch, ReplayError, Result, Shutdown};
use crate::transport::TraceTransport;
use std::fmt;
use std::time::Duration;

/// Lifecycle of the collector session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not yet opened
    Unstarted,
    /// Open and accepting uploads
    Started,
    /// Closed; terminal
    Stopped,
}

impl ConnectionState {
    fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Unstarted => "unstarted",
            ConnectionState::Started => "started",
            ConnectionState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sends batches over a single exclusively owned transport session.
pub struct Uploader<T: TraceTransport> {
    transport: T,
    state: ConnectionState,
    shutdown: Shutdown,
    batches_sent: u64,
    spans_sent: u64,
}

impl<T: TraceTransport> Uploader<T> {
    /// Wrap an unstarted transport.
    pub fn new(transport: T, shutdown: Shutdown) -> Self {
        Self {
            transport,
            state: ConnectionState::Unstarted,
            shutdown,
            batches_sent: 0,
            spans_sent: 0,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Batches delivered so far.
    pub fn batches_sent(&self) -> u64 {
        self.batches_sent
    }

    /// Spans delivered so far.
    pub fn spans_sent(&self) -> u64 {
        self.spans_sent
    }

    /// Start the session. Fails if `deadline` passes first, the dial fails,
    /// or the run is cancelled.
    pub async fn open(&mut self, deadline: Duration) -> Result<()> {
        if self.state != ConnectionState::Unstarted {
            return Err(ReplayError::InvalidState(self.state.as_str()));
        }

        let shutdown = &self.shutdown;
        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            result = tokio::time::timeout(deadline, self.transport.start(deadline)) => Some(result),
        };

        match outcome {
            None => Err(ReplayError::Cancelled),
            Some(Err(_elapsed)) => Err(ReplayError::StartTimeout {
                timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            }),
            Some(Ok(Err(e))) => Err(ReplayError::ConnectionStart(e)),
            Some(Ok(Ok(()))) => {
                self.state = ConnectionState::Started;
                tracing::debug!("Collector session started");
                Ok(())
            },
        }
    }

    /// Transmit one batch. Any failure is fatal to the run.
    pub async fn send(&mut self, batch: Batch) -> Result<()> {
        if self.state != ConnectionState::Started {
            return Err(ReplayError::InvalidState(self.state.as_str()));
        }

        let seq = self.batches_sent + 1;
        let records = batch.len();
        let spans = batch.span_count() as u64;

        let shutdown = &self.shutdown;
        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            result = self.transport.upload(batch.into_records()) => Some(result),
        };

        match outcome {
            None => Err(ReplayError::Cancelled),
            Some(Err(source)) => Err(ReplayError::Transmission { batch: seq, source }),
            Some(Ok(())) => {
                self.batches_sent = seq;
                self.spans_sent += spans;
                tracing::debug!(batch = seq, records, spans, "Uploaded batch");
                Ok(())
            },
        }
    }

    /// Stop the session.
    ///
    /// Only the first call reaches the transport; later calls return `Ok`.
    /// Closing a session that never started just marks it stopped.
    pub async fn close(&mut self) -> Result<()> {
        let previous = std::mem::replace(&mut self.state, ConnectionState::Stopped);
        if previous != ConnectionState::Started {
            return Ok(());
        }

        let shutdown = &self.shutdown;
        // Prefer finishing the stop; cancellation only cuts a stop that blocks.
        let outcome = tokio::select! {
            biased;
            result = self.transport.stop() => Some(result),
            _ = shutdown.cancelled() => None,
        };

        match outcome {
            None => Err(ReplayError::Cancelled),
            Some(Err(e)) => Err(ReplayError::ConnectionStop(e)),
            Some(Ok(())) => {
                tracing::debug!(batches = self.batches_sent, "Collector session stopped");
                Ok(())
            },
        }
    }
}

impl<T: TraceTransport> Drop for Uploader<T> {
    fn drop(&mut self) {
        // The transport is released with us either way; this flags a path
        // that skipped the explicit close.
        if self.state == ConnectionState::Started {
            tracing::warn!("Collector session dropped without being stopped");
        }
    }
}
