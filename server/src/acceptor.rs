//! Accept loop
//!
//! Connections are accepted with a bounded wait so shutdown is noticed even
//! when nobody is connecting. Every accepted connection gets its own handler
//! task; accepting never waits on a handler. On shutdown the loop stops
//! accepting and gives in-flight sessions the grace period to unwind.

use crate::broker::Broker;
use crate::error::ServerError;
use crate::session::handle_connection;
use log::{error, info, warn};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};

/// Pause after a failed accept so a persistent error doesn't spin the loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// A listener that can wait for a connection for at most a given duration
pub trait BoundedAccept: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + 'static;

    /// Resolves to `Ok(None)` if nothing arrived within `wait`
    fn accept_within(
        &self,
        wait: Duration,
    ) -> impl Future<Output = io::Result<Option<(Self::Stream, SocketAddr)>>> + Send;
}

impl BoundedAccept for TcpListener {
    type Stream = TcpStream;

    async fn accept_within(&self, wait: Duration) -> io::Result<Option<(TcpStream, SocketAddr)>> {
        match timeout(wait, self.accept()).await {
            Ok(Ok(accepted)) => Ok(Some(accepted)),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(None),
        }
    }
}

/// Errors after which the listener can never accept again
fn is_listener_closed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::NotConnected
    )
}

/// Accepts connections until shutdown, then drains open sessions.
///
/// Transient accept errors are logged and accepting continues. If the listener
/// itself is gone, shutdown is triggered so open sessions unwind, and the
/// error is returned once they have.
pub async fn run_acceptor<L>(listener: L, broker: Arc<Broker>) -> Result<(), ServerError>
where
    L: BoundedAccept,
{
    let wait = broker.config().accept_wait;
    let mut shutdown = broker.shutdown().subscribe();
    let mut sessions = JoinSet::new();

    let result = loop {
        tokio::select! {
            _ = shutdown.fired() => break Ok(()),
            Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(e) = finished {
                    if e.is_panic() {
                        error!("Session task panicked: {}", e);
                    }
                }
            }
            accepted = listener.accept_within(wait) => match accepted {
                Ok(Some((stream, addr))) => {
                    sessions.spawn(handle_connection(stream, addr, Arc::clone(&broker)));
                }
                Ok(None) => {}
                Err(_) if broker.shutdown().is_shutting_down() => break Ok(()),
                Err(e) if is_listener_closed(&e) => {
                    error!("Listener closed: {}", e);
                    broker.shutdown().trigger();
                    break Err(ServerError::ListenerClosed(e));
                }
                Err(e) => {
                    warn!("Error accepting connection: {}", e);
                    sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }
    };

    drain_sessions(&mut sessions, broker.config().shutdown_grace).await;
    result
}

/// Waits up to `grace` for every session to finish, then aborts the rest
async fn drain_sessions<T: 'static>(sessions: &mut JoinSet<T>, grace: Duration) {
    if sessions.is_empty() {
        return;
    }

    info!(
        "Waiting up to {:?} for {} client(s) to disconnect...",
        grace,
        sessions.len()
    );
    let drained = timeout(grace, async {
        while sessions.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        warn!(
            "Grace period elapsed with {} session(s) still open, closing them",
            sessions.len()
        );
        sessions.abort_all();
        while sessions.join_next().await.is_some() {}
    }
}
