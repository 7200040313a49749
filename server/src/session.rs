//! Per-connection lifecycle
//!
//! Each accepted connection moves through
//! `Handshaking -> Active -> Closing -> Closed`:
//!
//! - **Handshaking**: the first line is the display name, and any lines that
//!   arrived in the same read become the client's first messages. If the peer
//!   closes, errors or stays silent past the handshake timeout, the session
//!   goes straight to `Closed` without announcing anything.
//! - **Active**: the client is welcomed, its join is appended to the log, and
//!   its cursor is placed just past that join. A reader task and a writer task
//!   run until the client disconnects or the server shuts down.
//! - **Closing**: whichever happened first decides the exit. A disconnect is
//!   announced to the room; a shutdown sends the client a best-effort farewell
//!   and skips the leave announcement.
//! - **Closed**: the socket is shut down and released.

use crate::broker::{Broker, SessionId};
use crate::error::ConnectionError;
use crate::reader::{read_chunk, read_loop};
use crate::signal::OnceSignal;
use crate::writer::{write_line, write_loop};
use log::{debug, error, info, warn};
use shared::{split_lines, LineDecoder, Message};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Active,
    Closing,
    Closed,
}

/// What a session's reader and writer tasks share
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: SessionId,
    pub broker: Arc<Broker>,
    /// Fires once when the client goes away
    pub disconnect: OnceSignal,
}

impl SessionContext {
    /// Fires the disconnect signal unless the server is already shutting down.
    ///
    /// Returns whether this call fired it.
    pub fn end(&self) -> bool {
        if self.broker.shutdown().is_shutting_down() {
            return false;
        }
        self.disconnect.fire()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Disconnected,
    Shutdown,
}

/// Outcome of a successful handshake
struct Greeting {
    name: String,
    /// Chat lines that arrived in the same read as the name
    backlog: Vec<String>,
    decoder: LineDecoder,
}

/// Aborts the wrapped task when dropped
struct TaskGuard(JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct ConnectionHandler<S> {
    id: SessionId,
    peer: String,
    broker: Arc<Broker>,
    state: SessionState,
    writer: Arc<Mutex<WriteHalf<S>>>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    fn transition(&mut self, next: SessionState) {
        debug!("[{}] {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    async fn run(mut self, mut reader: ReadHalf<S>) -> SessionState {
        let Some(Greeting {
            name,
            backlog,
            decoder,
        }) = self.handshake(&mut reader).await
        else {
            self.close().await;
            return self.state;
        };

        // The cursor starts just past our own join so it is never replayed
        // to us, and nothing from before the handshake is either.
        let join_index = self.broker.announce(Message::joined(&name)).await;
        let cursor = join_index + 1;

        for line in backlog {
            debug!("[{}] Received message from {}: {}", self.id, name, line);
            self.broker.broadcast(Message::new(name.as_str(), line)).await;
        }

        let ctx = SessionContext {
            id: self.id,
            broker: Arc::clone(&self.broker),
            disconnect: OnceSignal::new(),
        };

        let reader_task = TaskGuard(tokio::spawn(read_loop(reader, name.clone(), decoder, ctx.clone())));
        let writer_task = {
            let writer = Arc::clone(&self.writer);
            let ctx = ctx.clone();
            TaskGuard(tokio::spawn(async move {
                write_loop(&*writer, cursor, ctx).await;
            }))
        };
        self.transition(SessionState::Active);

        let mut disconnected = ctx.disconnect.listener();
        let mut shutdown = self.broker.shutdown().subscribe();
        let ending = tokio::select! {
            biased;
            _ = shutdown.fired() => Ending::Shutdown,
            _ = disconnected.fired() => Ending::Disconnected,
        };

        self.transition(SessionState::Closing);
        match ending {
            Ending::Shutdown => self.farewell(&name).await,
            Ending::Disconnected => {
                self.broker.announce(Message::left(&name)).await;
            }
        }

        drop(reader_task);
        drop(writer_task);
        self.close().await;
        self.state
    }

    /// Reads the display name and welcomes the client
    async fn handshake(&mut self, reader: &mut ReadHalf<S>) -> Option<Greeting> {
        let config = self.broker.config();
        let mut buffer = vec![0u8; config.buffer_len.max(1)];

        let n = match read_chunk(reader, &mut buffer, config.handshake_timeout).await {
            Ok(n) => n,
            Err(ConnectionError::Closed) => {
                info!("[{}] Client {} closed connection before sending name", self.id, self.peer);
                return None;
            }
            Err(ConnectionError::Timeout(after)) => {
                warn!("[{}] No name received from {} within {:?}", self.id, self.peer, after);
                return None;
            }
            Err(e) => {
                error!("[{}] Couldn't read name from {}: {}", self.id, self.peer, e);
                return None;
            }
        };

        let mut decoder = LineDecoder::new();
        let text = decoder.decode(&buffer[..n]);
        let (first, rest) = text.split_once('\n').unwrap_or((text.as_str(), ""));
        let name = first.trim().to_string();
        let backlog = split_lines(rest);

        let welcome = Message::welcome(&name).to_string();
        let sent = {
            let mut out = self.writer.lock().await;
            write_line(&mut *out, &welcome, config.write_timeout).await
        };
        if let Err(e) = sent {
            error!("[{}] Couldn't send welcome message: {}", self.id, e);
            return None;
        }

        info!("[{}] Client {} identified as '{}'", self.id, self.peer, name);
        Some(Greeting {
            name,
            backlog,
            decoder,
        })
    }

    async fn farewell(&self, name: &str) {
        let notice = Message::shutdown().to_string();
        let mut out = self.writer.lock().await;
        if let Err(e) = write_line(&mut *out, &notice, self.broker.config().write_timeout).await {
            warn!("[{}] Couldn't send shutdown message to {}: {}", self.id, name, e);
        }
    }

    async fn close(&mut self) {
        info!("[{}] Closing connection to {}", self.id, self.peer);
        let limit = self.broker.config().write_timeout;
        let mut out = self.writer.lock().await;
        match timeout(limit, out.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("[{}] Socket shutdown failed: {}", self.id, e),
            Err(_) => debug!("[{}] Socket shutdown timed out", self.id),
        }
        drop(out);
        self.transition(SessionState::Closed);
    }
}

/// Runs one client connection from handshake to close.
///
/// Failures are logged and contained here; nothing propagates to other
/// sessions. Returns the final state, which is always [`SessionState::Closed`].
pub async fn handle_connection<S>(stream: S, addr: SocketAddr, broker: Arc<Broker>) -> SessionState
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let _active = broker.track_session();
    let id = broker.next_session_id();
    let peer = broker.config().peer_label(&addr);
    info!("[{}] New connection from {}", id, peer);

    let (reader, writer) = split(stream);
    let handler = ConnectionHandler {
        id,
        peer,
        broker: Arc::clone(&broker),
        state: SessionState::Handshaking,
        writer: Arc::new(Mutex::new(writer)),
    };
    handler.run(reader).await
}
