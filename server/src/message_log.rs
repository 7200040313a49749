//! Shared append-only message log
//!
//! The log is the single source of truth for broadcast state. Entries are
//! addressed by the index they were assigned on append, starting at 0; an
//! index never changes meaning and nothing is ever removed. Sessions track
//! their progress as a plain index (their cursor) and never hold references
//! into the backing storage, so growth of the vector is invisible to them.
//!
//! Appends take the write lock only for the push itself. Snapshot reads take
//! the read lock and clone out `Arc` handles, so a reader either sees a message
//! in full or not at all, and the lock is never held across socket I/O.

use log::debug;
use shared::Message;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MessageLog {
    entries: RwLock<Vec<Arc<Message>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::with_capacity(capacity)),
        }
    }

    /// Appends a message and returns the index it was assigned
    pub async fn append(&self, message: Message) -> usize {
        let sender = message.sender.clone();
        let index = {
            let mut entries = self.entries.write().await;
            entries.push(Arc::new(message));
            entries.len() - 1
        };

        debug!("Broadcasted message from {} (log index: {})", sender, index);
        index
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Returns every entry in `[cursor, len)` in ascending index order.
    ///
    /// The length used is the one observed when the read lock was acquired;
    /// appends racing with this call show up on the next read.
    pub async fn read_from(&self, cursor: usize) -> Vec<(usize, Arc<Message>)> {
        let entries = self.entries.read().await;
        if cursor >= entries.len() {
            return Vec::new();
        }

        entries[cursor..]
            .iter()
            .enumerate()
            .map(|(offset, message)| (cursor + offset, Arc::clone(message)))
            .collect()
    }
}
