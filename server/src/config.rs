//! Server tunables, fixed for the lifetime of the process

use shared::{BUFFER_LEN, DEFAULT_PORT};
use std::net::SocketAddr;
use std::time::Duration;

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface the listener binds to
    pub host: String,
    pub port: u16,
    /// Size of the per-read buffer; longer lines arrive as several messages
    pub buffer_len: usize,
    /// How long a silent connection is waited on before the reader logs and retries
    pub read_timeout: Duration,
    /// How long a new connection may take to send its display name
    pub handshake_timeout: Duration,
    pub write_timeout: Duration,
    /// Upper bound on each accept wait, so shutdown is noticed promptly
    pub accept_wait: Duration,
    /// Writer poll period
    pub poll_interval: Duration,
    /// How long in-flight sessions get to unwind after shutdown is signalled
    pub shutdown_grace: Duration,
    /// Hide peer addresses in logs
    pub redact_addresses: bool,
    pub initial_log_capacity: usize,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Formats a peer address for logging, honoring `redact_addresses`
    pub fn peer_label(&self, addr: &SocketAddr) -> String {
        if self.redact_addresses {
            REDACTED.to_string()
        } else {
            addr.to_string()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            buffer_len: BUFFER_LEN,
            read_timeout: Duration::from_secs(5 * 60),
            handshake_timeout: Duration::from_secs(5 * 60),
            write_timeout: Duration::from_secs(10),
            accept_wait: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
            shutdown_grace: Duration::from_secs(3),
            redact_addresses: true,
            initial_log_capacity: 100,
        }
    }
}
