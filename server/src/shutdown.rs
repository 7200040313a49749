//! Process-wide graceful shutdown

use crate::signal::{OnceSignal, SignalListener};
use log::info;

/// Closed exactly once when the process is asked to stop.
///
/// The acceptor, every writer and every connection handler subscribe to it and
/// unwind on their own once it fires.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    signal: OnceSignal,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals shutdown. Returns `false` if it was already in progress.
    pub fn trigger(&self) -> bool {
        let first = self.signal.fire();
        if first {
            info!("Shutdown signalled, notifying all sessions");
        }
        first
    }

    pub fn is_shutting_down(&self) -> bool {
        self.signal.is_fired()
    }

    pub fn subscribe(&self) -> SignalListener {
        self.signal.listener()
    }
}

/// Waits for an interrupt or terminate request from the OS
#[cfg(unix)]
pub async fn wait_for_termination() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
pub async fn wait_for_termination() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
