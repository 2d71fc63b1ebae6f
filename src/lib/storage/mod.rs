pub mod keys;
pub mod memory;
#[cfg(feature = "storage")]
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::{Message, NewMessage};

/// Name of the single collection holding queued messages.
pub const QUEUE_COLLECTION: &str = "mq";

/// Returned by a scan visitor to keep going or stop early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    Continue,
    Stop,
}

/// Ordered, transactional store for one queue collection.
///
/// Mutations (`insert_message`, `remove_oldest`) each run in their own write
/// transaction. `scan` runs in a read transaction that sees a consistent
/// snapshot and never blocks a concurrent writer.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Draws the next sequence, derives the key from it and `time`, and
    /// stores the serialized message, all in one write transaction.
    async fn insert_message(
        &self,
        msg: NewMessage,
        time: DateTime<Utc>,
        id: Uuid,
    ) -> anyhow::Result<Message>;

    /// Deletes up to `count` entries starting from the oldest key. Returns
    /// how many were actually deleted.
    async fn remove_oldest(&self, count: usize) -> anyhow::Result<usize>;

    /// Visits raw entries oldest first until the visitor says stop or the
    /// collection ends. Returns the total number of entries in the snapshot.
    async fn scan(
        &self,
        visit: &mut (dyn for<'a> FnMut(&'a str, &'a [u8]) -> Scan + Send),
    ) -> anyhow::Result<usize>;
}
