//! Inbound half of a session: socket bytes into the message log

use crate::error::ConnectionError;
use crate::session::SessionContext;
use log::{debug, error, info, warn};
use shared::{LineDecoder, Message};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

/// Reads one chunk, bounded by `limit`.
///
/// A zero-byte read is reported as [`ConnectionError::Closed`].
pub(crate) async fn read_chunk<R>(
    reader: &mut R,
    buffer: &mut [u8],
    limit: Duration,
) -> Result<usize, ConnectionError>
where
    R: AsyncRead + Unpin,
{
    match timeout(limit, reader.read(buffer)).await {
        Err(_) => Err(ConnectionError::Timeout(limit)),
        Ok(Ok(0)) => Err(ConnectionError::Closed),
        Ok(Ok(n)) => Ok(n),
        Ok(Err(e)) => Err(ConnectionError::Io(e)),
    }
}

/// Appends every non-blank line the client sends until the connection ends.
///
/// `decoder` carries over any partial character left from the handshake read.
/// Idle timeouts are logged and the read is retried. A clean close or a read
/// failure ends the loop and fires the session's disconnect signal, unless the
/// server is already shutting down.
pub async fn read_loop<R>(mut reader: R, name: String, mut decoder: LineDecoder, ctx: SessionContext)
where
    R: AsyncRead + Unpin,
{
    let config = ctx.broker.config();
    let mut buffer = vec![0u8; config.buffer_len.max(1)];

    loop {
        match read_chunk(&mut reader, &mut buffer, config.read_timeout).await {
            Ok(n) => {
                for line in decoder.lines(&buffer[..n]) {
                    debug!("[{}] Received message from {}: {}", ctx.id, name, line);
                    ctx.broker.broadcast(Message::new(name.as_str(), line)).await;
                }
            }
            Err(ConnectionError::Timeout(after)) => {
                warn!("[{}] Read timed out after {:?}, still waiting", ctx.id, after);
            }
            Err(ConnectionError::Closed) => {
                info!("[{}] Client {} closed connection", ctx.id, name);
                break;
            }
            Err(e) => {
                error!("[{}] Couldn't read from client {}: {}", ctx.id, name, e);
                break;
            }
        }
    }

    ctx.end();
}
