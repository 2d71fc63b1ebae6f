use std::sync::Arc;

use tracing::{info, warn};

use crate::core::{Message, MessageBatch, RelayError};
use crate::storage::{Scan, Storage};

/// Queue depth as seen by one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueDepth {
    pub total: usize,
    /// Change since the previous read; zero on the first one.
    pub arrived: i64,
}

#[derive(Debug, Clone)]
pub struct BatchRead {
    pub batch: MessageBatch,
    pub depth: QueueDepth,
    pub anomalies: usize,
}

/// Read-only view of the queue, oldest first.
pub struct BatchReader<S: Storage + 'static> {
    storage: Arc<S>,
    last_total: usize,
}

impl<S: Storage + 'static> BatchReader<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            last_total: 0,
        }
    }

    /// Collect up to `batch_size` decodable messages from the head of the
    /// queue. Entries that fail to decode are logged and skipped, never
    /// deleted here.
    pub async fn read_batch(&mut self, batch_size: usize) -> Result<BatchRead, RelayError> {
        let mut messages: Vec<Message> = Vec::with_capacity(batch_size.min(1024));
        let mut anomalies = 0usize;

        let total = self
            .storage
            .scan(&mut |key: &str, value: &[u8]| {
                if messages.len() >= batch_size {
                    return Scan::Stop;
                }
                match serde_json::from_slice::<Message>(value) {
                    Ok(msg) => messages.push(msg),
                    Err(e) => {
                        anomalies += 1;
                        let anomaly = RelayError::DecodeAnomaly {
                            key: key.to_string(),
                            reason: e.to_string(),
                        };
                        warn!(%anomaly, "skipping queued entry");
                    }
                }
                if messages.len() >= batch_size {
                    Scan::Stop
                } else {
                    Scan::Continue
                }
            })
            .await?;

        let arrived = if self.last_total > 0 {
            total as i64 - self.last_total as i64
        } else {
            0
        };
        self.last_total = total;
        info!(total, arrived, "queue state");

        Ok(BatchRead {
            batch: MessageBatch::new(messages),
            depth: QueueDepth { total, arrived },
            anomalies,
        })
    }

    /// Depth reported by the most recent read.
    pub fn last_depth(&self) -> usize {
        self.last_total
    }
}
