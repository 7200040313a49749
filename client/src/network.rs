use log::{debug, info};
use shared::{frame_line, SERVER_NAME};
use thiserror::Error;
use tokio::io::{
    split, AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Empty name is not allowed!")]
    EmptyName,
    #[error("The name {0} is not allowed!")]
    ReservedName(String),
    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),
}

/// Checks a display name before it is sent; returns it trimmed
pub fn validate_name(name: &str) -> Result<&str, ClientError> {
    let name = name.trim();
    if name.is_empty() {
        Err(ClientError::EmptyName)
    } else if name == SERVER_NAME {
        Err(ClientError::ReservedName(name.to_string()))
    } else {
        Ok(name)
    }
}

pub struct ChatClient<S> {
    stream: S,
    name: String,
}

impl ChatClient<TcpStream> {
    pub async fn connect(server_addr: &str, name: &str) -> Result<Self, ClientError> {
        let name = validate_name(name)?.to_string();
        let stream = TcpStream::connect(server_addr).await?;
        info!("Connected to {} as {}", server_addr, name);

        Self::handshake(stream, name).await
    }
}

impl<S> ChatClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Announces `name` over an already open stream
    pub async fn handshake(mut stream: S, name: String) -> Result<Self, ClientError> {
        stream.write_all(frame_line(&name).as_bytes()).await?;
        Ok(ChatClient { stream, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Relays lines until the server closes the connection.
    ///
    /// When `input` runs out the write side is shut down, which the server
    /// treats as leaving the chat; server lines keep being written to `output`
    /// until the server closes its side.
    pub async fn run<I, O>(self, input: I, mut output: O) -> Result<(), ClientError>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let (read_half, mut write_half) = split(self.stream);
        let mut server_lines = BufReader::new(read_half).lines();
        let mut input_lines = input.lines();
        let mut input_open = true;

        loop {
            tokio::select! {
                line = server_lines.next_line() => match line? {
                    Some(line) => {
                        output.write_all(frame_line(&line).as_bytes()).await?;
                        output.flush().await?;
                    }
                    None => {
                        info!("Disconnected from server");
                        break;
                    }
                },
                line = input_lines.next_line(), if input_open => match line? {
                    Some(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        write_half.write_all(frame_line(line).as_bytes()).await?;
                    }
                    None => {
                        debug!("Input closed, leaving the chat");
                        input_open = false;
                        write_half.shutdown().await?;
                    }
                },
            }
        }

        Ok(())
    }
}
