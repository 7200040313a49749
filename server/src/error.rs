use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failures that stop the whole server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("couldn't start server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("listener closed: {0}")]
    ListenerClosed(#[source] io::Error),
}

/// Failures of a single connection's socket I/O
///
/// These never escape the session that hit them.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection closed by peer")]
    Closed,
    #[error(transparent)]
    Io(#[from] io::Error),
}
