//! End-to-end tests for the chat relay over real TCP sockets
//!
//! Each test runs its own in-process server on an ephemeral port with short
//! timeouts, so tests are independent of each other.

use server::{run_acceptor, Broker, ServerConfig, ServerError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const LINE_TIMEOUT: Duration = Duration::from_secs(2);

struct TestServer {
    addr: SocketAddr,
    broker: Arc<Broker>,
    acceptor: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            read_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(1),
            accept_wait: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
            shutdown_grace: Duration::from_secs(1),
            redact_addresses: false,
            ..ServerConfig::default()
        })
        .await
    }

    async fn start_with(config: ServerConfig) -> Self {
        let listener = TcpListener::bind(config.bind_address()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let broker = Arc::new(Broker::new(config));
        let acceptor = tokio::spawn(run_acceptor(listener, Arc::clone(&broker)));

        TestServer {
            addr,
            broker,
            acceptor,
        }
    }

    async fn log_lines(&self) -> Vec<String> {
        self.broker
            .log()
            .read_from(0)
            .await
            .into_iter()
            .map(|(_, message)| message.to_string())
            .collect()
    }

    async fn wait_for_log_len(&self, len: usize) {
        timeout(LINE_TIMEOUT, async {
            while self.broker.log().len().await < len {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("message log did not reach expected length");
    }
}

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        TestClient {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    /// Connects and completes the handshake, consuming the welcome line
    async fn join(addr: SocketAddr, name: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.send(name).await;
        assert_eq!(
            client.expect_line().await,
            format!("SERVER: Welcome to the chat, {}!", name)
        );
        client
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .unwrap();
    }

    async fn expect_line(&mut self) -> String {
        timeout(LINE_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
            .expect("connection closed while waiting for a line")
    }

    async fn expect_closed(&mut self) {
        let next = timeout(LINE_TIMEOUT, self.lines.next_line())
            .await
            .expect("connection was not closed");
        assert!(matches!(next, Ok(None) | Err(_)), "unexpected line: {:?}", next);
    }

    async fn expect_silence(&mut self, period: Duration) {
        if let Ok(line) = timeout(period, self.lines.next_line()).await {
            panic!("expected no traffic, got {:?}", line);
        }
    }
}

/// CONNECTION LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    /// A later joiner sees neither its own join nor earlier history
    #[tokio::test]
    async fn late_joiner_sees_no_history() {
        let server = TestServer::start().await;

        let mut alice = TestClient::join(server.addr, "alice").await;
        alice.send("hi").await;
        server.wait_for_log_len(2).await;

        let mut bob = TestClient::join(server.addr, "bob").await;
        assert_eq!(alice.expect_line().await, "alice: hi");
        assert_eq!(alice.expect_line().await, "SERVER: bob has joined the chat");

        bob.expect_silence(Duration::from_millis(200)).await;
    }

    /// Departures are announced to the remaining clients
    #[tokio::test]
    async fn leave_is_announced() {
        let server = TestServer::start().await;

        let mut alice = TestClient::join(server.addr, "alice").await;
        let bob = TestClient::join(server.addr, "bob").await;
        assert_eq!(alice.expect_line().await, "SERVER: bob has joined the chat");

        drop(bob);
        assert_eq!(alice.expect_line().await, "SERVER: bob has left the chat");
    }

    /// A connection that closes before naming itself leaves no trace
    #[tokio::test]
    async fn silent_disconnect_before_handshake() {
        let server = TestServer::start().await;

        let client = TestClient::connect(server.addr).await;
        drop(client);

        let mut alice = TestClient::join(server.addr, "alice").await;
        alice.expect_silence(Duration::from_millis(100)).await;
        assert_eq!(
            server.log_lines().await,
            vec!["SERVER: alice has joined the chat"]
        );
    }

    /// Duplicate display names are allowed
    #[tokio::test]
    async fn duplicate_names_are_allowed() {
        let server = TestServer::start().await;

        let mut first = TestClient::join(server.addr, "sam").await;
        let _second = TestClient::join(server.addr, "sam").await;
        assert_eq!(first.expect_line().await, "SERVER: sam has joined the chat");
    }
}

/// BROADCAST TESTS
mod broadcast_tests {
    use super::*;

    /// Every client, the sender included, receives a message exactly once
    #[tokio::test]
    async fn message_reaches_everyone_once() {
        let server = TestServer::start().await;

        let mut alice = TestClient::join(server.addr, "alice").await;
        let mut bob = TestClient::join(server.addr, "bob").await;
        assert_eq!(alice.expect_line().await, "SERVER: bob has joined the chat");

        alice.send("hello room").await;
        assert_eq!(alice.expect_line().await, "alice: hello room");
        assert_eq!(bob.expect_line().await, "alice: hello room");

        alice.expect_silence(Duration::from_millis(150)).await;
        bob.expect_silence(Duration::from_millis(50)).await;
    }

    /// All clients observe the same global order
    #[tokio::test]
    async fn clients_share_one_order() {
        let server = TestServer::start().await;

        let mut alice = TestClient::join(server.addr, "alice").await;
        let mut bob = TestClient::join(server.addr, "bob").await;
        assert_eq!(alice.expect_line().await, "SERVER: bob has joined the chat");

        for i in 0..5 {
            alice.send(&format!("a{}", i)).await;
            bob.send(&format!("b{}", i)).await;
        }
        server.wait_for_log_len(12).await;

        let mut seen_by_alice = Vec::new();
        let mut seen_by_bob = Vec::new();
        for _ in 0..10 {
            seen_by_alice.push(alice.expect_line().await);
            seen_by_bob.push(bob.expect_line().await);
        }

        assert_eq!(seen_by_alice, seen_by_bob);
        assert_eq!(seen_by_alice, server.log_lines().await[2..].to_vec());
    }

    /// Blank lines never reach the log
    #[tokio::test]
    async fn blank_lines_are_dropped() {
        let server = TestServer::start().await;

        let mut alice = TestClient::join(server.addr, "alice").await;
        alice.send("   ").await;
        alice.send("").await;
        alice.send("\t").await;
        alice.send("real").await;

        assert_eq!(alice.expect_line().await, "alice: real");
        assert_eq!(
            server.log_lines().await,
            vec!["SERVER: alice has joined the chat", "alice: real"]
        );
    }

    /// A line longer than the read buffer is logged as several messages
    #[tokio::test]
    async fn oversized_message_is_split() {
        let server = TestServer::start().await;
        let mut alice = TestClient::join(server.addr, "alice").await;

        let payload = "x".repeat(shared::BUFFER_LEN * 2 + 100);
        alice.send(&payload).await;

        timeout(LINE_TIMEOUT, async {
            loop {
                let total: usize = server
                    .broker
                    .log()
                    .read_from(1)
                    .await
                    .iter()
                    .map(|(_, message)| message.content.len())
                    .sum();
                if total >= payload.len() {
                    break;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("payload never fully arrived");

        let fragments = server.broker.log().read_from(1).await;
        assert!(fragments.len() >= 3, "got {} fragments", fragments.len());
        assert!(fragments
            .iter()
            .all(|(_, message)| message.sender == "alice"
                && message.content.len() <= shared::BUFFER_LEN));

        let rejoined: String = fragments
            .iter()
            .map(|(_, message)| message.content.as_str())
            .collect();
        assert_eq!(rejoined, payload);
    }
}

/// SHUTDOWN TESTS
mod shutdown_tests {
    use super::*;

    /// Connected clients get a farewell and the connection closes within the grace period
    #[tokio::test]
    async fn shutdown_says_goodbye() {
        let mut server = TestServer::start().await;

        let mut alice = TestClient::join(server.addr, "alice").await;
        let mut bob = TestClient::join(server.addr, "bob").await;
        assert_eq!(alice.expect_line().await, "SERVER: bob has joined the chat");

        server.broker.shutdown().trigger();

        assert_eq!(
            alice.expect_line().await,
            "SERVER: Server is shutting down. Goodbye!"
        );
        assert_eq!(
            bob.expect_line().await,
            "SERVER: Server is shutting down. Goodbye!"
        );
        alice.expect_closed().await;
        bob.expect_closed().await;

        let result = timeout(Duration::from_secs(3), &mut server.acceptor)
            .await
            .expect("acceptor did not finish within the grace period")
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(server.broker.active_sessions(), 0);

        // Shutdown is not announced as anyone leaving
        assert!(!server
            .log_lines()
            .await
            .iter()
            .any(|line| line.ends_with("has left the chat")));
    }

    /// New connections are refused once the acceptor has stopped
    #[tokio::test]
    async fn no_accepts_after_shutdown() {
        let server = TestServer::start().await;
        let addr = server.addr;

        server.broker.shutdown().trigger();
        timeout(Duration::from_secs(3), server.acceptor)
            .await
            .expect("acceptor did not stop")
            .unwrap()
            .unwrap();

        assert!(TcpStream::connect(addr).await.is_err());
    }

    /// The terminal client exits cleanly when the server shuts down
    #[tokio::test]
    async fn chat_client_sees_farewell() {
        let server = TestServer::start().await;

        let client = client::ChatClient::connect(&server.addr.to_string(), "carol")
            .await
            .unwrap();
        let (input_rx, _input_tx) = tokio::io::duplex(64);
        let run = tokio::spawn(async move {
            let mut output = Vec::new();
            client.run(BufReader::new(input_rx), &mut output).await?;
            Ok::<_, client::ClientError>(output)
        });

        server.wait_for_log_len(1).await;
        server.broker.shutdown().trigger();

        let output = timeout(Duration::from_secs(3), run)
            .await
            .expect("client did not exit")
            .unwrap()
            .unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "SERVER: Welcome to the chat, carol!\nSERVER: Server is shutting down. Goodbye!\n"
        );
    }
}
