//! # Chat Client Library
//!
//! A terminal client for the chat relay. It connects over TCP, sends the
//! user's display name as the first line, then relays lines in both
//! directions: each line typed on the input goes to the server, and each line
//! the server sends is written to the output.
//!
//! ## Protocol
//!
//! Everything on the wire is newline-terminated UTF-8 text. The server prefixes
//! each relayed line with its sender (`alice: hi`); its own announcements use
//! the reserved sender `SERVER`, which is why that name is rejected here.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::ChatClient;
//! use tokio::io::{stdin, stdout, BufReader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::connect("127.0.0.1:6969", "alice").await?;
//!     client.run(BufReader::new(stdin()), stdout()).await?;
//!     Ok(())
//! }
//! ```

pub mod network;

pub use network::{validate_name, ChatClient, ClientError};
