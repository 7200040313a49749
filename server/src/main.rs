use clap::Parser;
use log::{error, info};
use server::error::ServerError;
use server::shutdown::wait_for_termination;
use server::{run_acceptor, Broker, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Interface to listen on
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Read buffer size in bytes; longer lines are split into several messages
    #[arg(short, long, default_value_t = shared::BUFFER_LEN)]
    buffer_len: usize,

    /// Seconds a connection may stay silent before the read is retried
    #[arg(long, default_value = "300")]
    read_timeout: u64,

    /// Seconds a single write may take
    #[arg(long, default_value = "10")]
    write_timeout: u64,

    /// Milliseconds between message log polls per client
    #[arg(long, default_value = "100")]
    poll_interval: u64,

    /// Seconds given to open sessions after a shutdown signal
    #[arg(short, long, default_value = "3")]
    grace: u64,

    /// Log client addresses instead of redacting them
    #[arg(long)]
    show_addresses: bool,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let read_timeout = Duration::from_secs(self.read_timeout);
        ServerConfig {
            host: self.host,
            port: self.port,
            buffer_len: self.buffer_len,
            read_timeout,
            handshake_timeout: read_timeout,
            write_timeout: Duration::from_secs(self.write_timeout),
            poll_interval: Duration::from_millis(self.poll_interval.max(1)),
            shutdown_grace: Duration::from_secs(self.grace),
            redact_addresses: !self.show_addresses,
            ..ServerConfig::default()
        }
    }
}

/// Binds the listener, runs the acceptor and waits for a termination signal.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();
    let address = config.bind_address();
    let port = config.port;

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            addr: address.clone(),
            source,
        })?;

    let broker = Arc::new(Broker::new(config));
    info!("Chat server started on port {}", port);
    info!("Press Ctrl+C to shutdown");

    let mut acceptor = tokio::spawn(run_acceptor(listener, Arc::clone(&broker)));

    tokio::select! {
        signal = wait_for_termination() => {
            signal?;
            info!("Received shutdown signal");
            broker.shutdown().trigger();
        }
        finished = &mut acceptor => {
            // The acceptor only returns on its own if the listener died
            return match finished {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.into()),
                Err(e) => Err(e.into()),
            };
        }
    }

    match acceptor.await {
        Ok(Ok(())) => info!("Server shutdown complete"),
        Ok(Err(e)) => error!("Server stopped with error: {}", e),
        Err(e) => error!("Acceptor task panicked: {}", e),
    }

    Ok(())
}
