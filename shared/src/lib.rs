//! Line protocol shared by the chat relay server and its clients.
//!
//! Every line on the wire is newline-terminated UTF-8. The first line a client
//! sends is its display name; every later line is chat content. The server
//! answers with `"<sender>: <content>"` lines, where system announcements use
//! the reserved sender [`SERVER_NAME`].

use std::fmt;

pub const DEFAULT_PORT: u16 = 6969;
pub const BUFFER_LEN: usize = 512;
pub const SERVER_NAME: &str = "SERVER";
pub const SHUTDOWN_NOTICE: &str = "Server is shutting down. Goodbye!";

/// A single chat line, either relayed from a client or announced by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub content: String,
}

impl Message {
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
        }
    }

    /// Creates an announcement sent on behalf of the server itself
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(SERVER_NAME, content)
    }

    pub fn welcome(name: &str) -> Self {
        Self::system(format!("Welcome to the chat, {}!", name))
    }

    pub fn joined(name: &str) -> Self {
        Self::system(format!("{} has joined the chat", name))
    }

    pub fn left(name: &str) -> Self {
        Self::system(format!("{} has left the chat", name))
    }

    pub fn shutdown() -> Self {
        Self::system(SHUTDOWN_NOTICE)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.sender, self.content)
    }
}

/// Appends the line terminator used on the wire
pub fn frame_line(line: &str) -> String {
    let mut framed = String::with_capacity(line.len() + 1);
    framed.push_str(line);
    framed.push('\n');
    framed
}

/// Splits decoded text into trimmed, non-empty lines
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Splits one received chunk into trimmed, non-empty text lines.
///
/// Invalid UTF-8 is replaced rather than rejected. A line that straddles two
/// chunks comes out as two separate fragments; nothing is buffered between
/// calls. Use [`LineDecoder`] for a stream of chunks.
pub fn decode_lines(chunk: &[u8]) -> Vec<String> {
    split_lines(&String::from_utf8_lossy(chunk))
}

/// Decodes a stream of chunks without splitting multi-byte characters.
///
/// Only an incomplete character at the very end of a chunk is held back for
/// the next one. Line fragments are not reassembled.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the text of every complete character received so far
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let complete = self.pending.len() - incomplete_tail_len(&self.pending);
        let text = String::from_utf8_lossy(&self.pending[..complete]).into_owned();
        self.pending.drain(..complete);
        text
    }

    pub fn lines(&mut self, chunk: &[u8]) -> Vec<String> {
        split_lines(&self.decode(chunk))
    }
}

/// Length of a valid but unfinished UTF-8 sequence at the end of `bytes`
fn incomplete_tail_len(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);
    for i in (start..bytes.len()).rev() {
        // Continuation byte, keep looking for the lead byte
        if bytes[i] & 0xC0 == 0x80 {
            continue;
        }
        let tail = &bytes[i..];
        return match std::str::from_utf8(tail) {
            Err(e) if e.valid_up_to() == 0 && e.error_len().is_none() => tail.len(),
            _ => 0,
        };
    }
    0
}
