//! The shared relay instance: message log, shutdown signal and configuration.
//!
//! One `Broker` is constructed at startup and handed to the acceptor and every
//! session behind an `Arc`. Independent brokers share nothing, which lets tests
//! run several servers side by side in one process.

use crate::config::ServerConfig;
use crate::message_log::MessageLog;
use crate::shutdown::ShutdownCoordinator;
use log::info;
use shared::Message;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Identifies a connection in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[derive(Debug)]
pub struct Broker {
    config: ServerConfig,
    log: MessageLog,
    shutdown: ShutdownCoordinator,
    next_session_id: AtomicU64,
    active_sessions: AtomicUsize,
}

impl Broker {
    pub fn new(config: ServerConfig) -> Self {
        let log = MessageLog::with_capacity(config.initial_log_capacity);
        Self {
            config,
            log,
            shutdown: ShutdownCoordinator::new(),
            next_session_id: AtomicU64::new(1),
            active_sessions: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Appends a message for delivery to every connected client
    pub async fn broadcast(&self, message: Message) -> usize {
        self.log.append(message).await
    }

    /// Appends an announcement from the server itself
    pub async fn announce(&self, message: Message) -> usize {
        info!("server: {}", message.content);
        self.log.append(message).await
    }

    pub fn next_session_id(&self) -> SessionId {
        SessionId(self.next_session_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of connection handlers that have not yet reached `Closed`
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Counts a session as active until the returned guard is dropped
    pub fn track_session(&self) -> SessionGuard<'_> {
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
        SessionGuard {
            active_sessions: &self.active_sessions,
        }
    }
}

#[derive(Debug)]
pub struct SessionGuard<'a> {
    active_sessions: &'a AtomicUsize,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.active_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}
