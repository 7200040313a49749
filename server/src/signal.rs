//! Broadcast-once notification shared by the shutdown coordinator and
//! per-session disconnect tracking.
//!
//! A [`OnceSignal`] starts unfired and can be fired exactly once. Every
//! [`SignalListener`], whether created before or after the firing, observes it
//! immediately; nothing is queued and nothing is consumed by a waiter.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct OnceSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl OnceSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fires the signal, waking every listener.
    ///
    /// Returns `true` only for the call that actually fired it.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn listener(&self) -> SignalListener {
        SignalListener {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for OnceSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct SignalListener {
    rx: watch::Receiver<bool>,
}

impl SignalListener {
    /// Resolves once the signal has fired. Cancel-safe.
    pub async fn fired(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Every OnceSignal handle is gone, so this can never fire.
                std::future::pending::<()>().await;
            }
        }
    }

    pub fn is_fired(&self) -> bool {
        *self.rx.borrow()
    }
}
