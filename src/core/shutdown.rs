//! Run-wide cancellation signal.
//!
//! A single [`ShutdownTrigger`] is held by the process plumbing (ctrl-c
//! handling); cloned [`Shutdown`] handles are threaded into every network
//! operation so they can unwind instead of blocking.

use std::sync::Arc;
use tokio::sync::watch;

/// Create a linked trigger/handle pair.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx, _sender: None })
}

/// Fires the cancellation signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Signal every [`Shutdown`] handle. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes the cancellation signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
    /// Keeps the channel open for handles created by [`Shutdown::never`].
    _sender: Option<Arc<watch::Sender<bool>>>,
}

impl Shutdown {
    /// A handle that is never cancelled.
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _sender: Some(Arc::new(tx)),
        }
    }

    /// True once the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when the signal fires or the trigger is dropped.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // An Err means the trigger is gone, which is treated as cancellation.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
