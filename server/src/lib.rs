//! # Chat Relay Server Library
//!
//! A plain-text chat relay. Clients connect over TCP, send a display name as
//! their first line, and from then on every line they send is fanned out to
//! every other connected client in the order the server received it.
//!
//! ## Core Responsibilities
//!
//! ### Shared Message Log
//! All broadcast state lives in one append-only [`MessageLog`]. Each entry gets
//! an index on append and is never changed or removed afterwards, so the log's
//! length only ever grows. Every message is delivered to every client in log
//! order, giving a single total order across senders.
//!
//! ### Per-Connection Sessions
//! Each connection runs a small state machine (see [`session`]): a name
//! handshake, then a reader task appending the client's lines to the log and a
//! writer task polling the log for entries past the session's private cursor.
//! A session's failures stay inside that session.
//!
//! ### Coordinated Shutdown
//! A single broadcast-once signal reaches the acceptor, every writer and every
//! handler at the same moment. Sessions send a farewell, the acceptor stops
//! taking connections, and in-flight sessions get a bounded grace period.
//!
//! ## Module Organization
//!
//! - [`message_log`]: the append-only log and its snapshot reads
//! - [`broker`]: the explicit shared instance handed to every task
//! - [`acceptor`]: bounded-wait accepting and shutdown draining
//! - [`session`], [`reader`], [`writer`]: per-connection lifecycle and I/O
//! - [`signal`], [`shutdown`]: broadcast-once signalling
//! - [`config`], [`error`]: tunables and error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{run_acceptor, Broker, ServerConfig};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let listener = TcpListener::bind(config.bind_address()).await?;
//!     let broker = Arc::new(Broker::new(config));
//!
//!     let acceptor = tokio::spawn(run_acceptor(listener, Arc::clone(&broker)));
//!
//!     server::shutdown::wait_for_termination().await?;
//!     broker.shutdown().trigger();
//!     acceptor.await??;
//!     Ok(())
//! }
//! ```
//!
//! ## Known Limitations
//!
//! - Reads use a fixed-size buffer. A line longer than the buffer reaches the
//!   log as several separate messages. Only a multi-byte character cut by the
//!   buffer boundary is carried over to the next read.
//! - The log grows for as long as the process lives.
//! - Delivery is at-most-once: a client whose writer fails, or who is still
//!   connected when the grace period ends, may miss messages.

pub mod acceptor;
pub mod broker;
pub mod config;
pub mod error;
pub mod message_log;
pub mod reader;
pub mod session;
pub mod shutdown;
pub mod signal;
pub mod writer;

pub use acceptor::{run_acceptor, BoundedAccept};
pub use broker::{Broker, SessionId};
pub use config::ServerConfig;
pub use error::{ConnectionError, ServerError};
pub use message_log::MessageLog;
pub use session::{handle_connection, SessionState};
pub use shutdown::ShutdownCoordinator;
