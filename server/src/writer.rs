//! Outbound half of a session: polls the message log and streams new entries
//!
//! Polling keeps the log free of per-subscriber bookkeeping. The cost is up
//! to one poll interval of latency and a wakeup per interval while idle.

use crate::error::ConnectionError;
use crate::message_log::MessageLog;
use crate::session::SessionContext;
use log::{debug, error};
use shared::frame_line;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Writes one newline-terminated line, bounded by `limit`
pub(crate) async fn write_line<W>(
    writer: &mut W,
    line: &str,
    limit: Duration,
) -> Result<(), ConnectionError>
where
    W: AsyncWrite + Unpin,
{
    let framed = frame_line(line);
    match timeout(limit, writer.write_all(framed.as_bytes())).await {
        Err(_) => Err(ConnectionError::Timeout(limit)),
        Ok(result) => result.map_err(ConnectionError::from),
    }
}

/// Sends every entry from `cursor` onwards, advancing it after each line
async fn deliver<W>(
    writer: &Mutex<W>,
    cursor: &mut usize,
    log: &MessageLog,
    write_timeout: Duration,
) -> Result<usize, ConnectionError>
where
    W: AsyncWrite + Unpin,
{
    let pending = log.read_from(*cursor).await;
    if pending.is_empty() {
        return Ok(0);
    }

    let mut out = writer.lock().await;
    let mut sent = 0;
    for (index, message) in pending {
        write_line(&mut *out, &message.to_string(), write_timeout).await?;
        *cursor = index + 1;
        sent += 1;
    }
    Ok(sent)
}

/// Streams log entries to the client starting at `cursor`.
///
/// Returns the final cursor once the session disconnects, the server shuts
/// down, or a send fails. A failed send ends the session.
pub async fn write_loop<W>(writer: &Mutex<W>, mut cursor: usize, ctx: SessionContext) -> usize
where
    W: AsyncWrite + Unpin,
{
    let config = ctx.broker.config();
    let mut ticker = interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut disconnected = ctx.disconnect.listener();
    let mut shutdown = ctx.broker.shutdown().subscribe();

    loop {
        tokio::select! {
            _ = disconnected.fired() => return cursor,
            _ = shutdown.fired() => return cursor,
            _ = ticker.tick() => {
                let start = cursor;
                let delivery = tokio::select! {
                    biased;
                    _ = disconnected.fired() => return cursor,
                    _ = shutdown.fired() => return cursor,
                    result = deliver(writer, &mut cursor, ctx.broker.log(), config.write_timeout) => result,
                };

                match delivery {
                    Ok(0) => {}
                    Ok(sent) => {
                        debug!("[{}] Sent messages {} to {} to client", ctx.id, start, start + sent - 1);
                    }
                    Err(e) => {
                        error!("[{}] Error sending to client: {}", ctx.id, e);
                        ctx.end();
                        return cursor;
                    }
                }
            }
        }
    }
}
