//! Cooperative cancellation shared by every acquisition loop of one manager.
//!
//! A [`ShutdownHandle`] is held by the owner; each worker gets a cloned
//! [`ShutdownSignal`] and races it against its blocking operations. The signal
//! is level-triggered: once fired it stays fired, so a worker that checks late
//! still sees it. Dropping the handle without firing counts as a shutdown too.

use tokio::sync::watch;

/// Owner side of the shutdown signal.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Observer side of the shutdown signal.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Create a linked handle/signal pair.
pub fn channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

impl ShutdownHandle {
    /// Fire the signal. Repeated calls are harmless.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownSignal {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once shutdown has been requested (or the handle is gone).
    pub async fn recv(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
