use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::core::{BatchReader, OverflowPolicy, QueueConfig, QueueStats, RelayError, WriterHandle, stopped};
use crate::storage::Storage;
use crate::transport::Transport;

/// Result of one fetch, send and reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing queued, nothing sent.
    Empty,
    /// The collector took `sent` messages and they were removed. `trimmed`
    /// is non-zero only under [`OverflowPolicy::Always`].
    Delivered { sent: usize, trimmed: usize },
    /// The batch stayed queued; `dropped` oldest messages were discarded to
    /// bring the queue back to its maximum.
    Failed { dropped: usize },
}

/// Periodically forwards the oldest queued messages to the collector.
pub struct Transmitter<S: Storage + 'static, T: Transport> {
    reader: BatchReader<S>,
    transport: T,
    writer: WriterHandle,
    config: QueueConfig,
    stats: Arc<QueueStats>,
}

impl<S: Storage + 'static, T: Transport> Transmitter<S, T> {
    pub fn new(
        storage: Arc<S>,
        transport: T,
        writer: WriterHandle,
        config: QueueConfig,
        stats: Arc<QueueStats>,
    ) -> Self {
        Self {
            reader: BatchReader::new(storage),
            transport,
            writer,
            config,
            stats,
        }
    }

    /// Transmit right away, then once per interval until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            max_queue_size = self.config.max_queue_size,
            receiver = %self.config.receiver,
            "transmitter started"
        );
        loop {
            match self.cycle().await {
                Ok(_) => {}
                Err(RelayError::QueueUnavailable) => {
                    warn!("writer is gone, transmitter stopping");
                    break;
                }
                Err(e) => error!(error = %e, "transmission cycle aborted"),
            }

            debug!(wait_secs = self.config.interval.as_secs(), "transmission idle");
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = stopped(&mut shutdown) => break,
            }
        }
        info!("transmitter stopped");
    }

    pub async fn cycle(&mut self) -> Result<CycleOutcome, RelayError> {
        let read = self.reader.read_batch(self.config.batch_size).await?;
        self.stats.record_depth(read.depth.total);
        self.stats.record_decode_anomalies(read.anomalies);

        let batch = read.batch;
        if batch.is_empty() {
            debug!("nothing to transmit");
            return Ok(CycleOutcome::Empty);
        }

        info!(batch_id = %batch.batch_id, messages = batch.size, "transmission attempt");
        match self.transport.send_batch(&batch).await {
            Ok(()) => {
                self.stats.record_batch_sent();
                // Reads and removals both start at the oldest key and new
                // messages only land after it, so this removes exactly the
                // batch that was just delivered.
                let removed = self.writer.remove(batch.size).await?;
                info!(batch_id = %batch.batch_id, removed, "transmission complete");

                let trimmed = match self.config.overflow_policy {
                    OverflowPolicy::Always => self.trim(read.depth.total.saturating_sub(removed)).await?,
                    OverflowPolicy::OnFailure => 0,
                };
                Ok(CycleOutcome::Delivered {
                    sent: batch.size,
                    trimmed,
                })
            }
            Err(e) => {
                self.stats.record_transmit_failure();
                warn!(batch_id = %batch.batch_id, error = %e, "transmission failed");
                let dropped = self.trim(read.depth.total).await?;
                Ok(CycleOutcome::Failed { dropped })
            }
        }
    }

    /// Drop the oldest messages beyond `max_queue_size`, given the depth the
    /// caller last observed. A stale depth only means fewer get removed.
    async fn trim(&mut self, depth: usize) -> Result<usize, RelayError> {
        if depth <= self.config.max_queue_size {
            return Ok(0);
        }
        let surplus = depth - self.config.max_queue_size;
        let dropped = self.writer.remove(surplus).await?;
        self.stats.record_dropped(dropped);
        warn!(
            requested = surplus,
            dropped,
            max_queue_size = self.config.max_queue_size,
            "queue over capacity, dropped oldest undelivered messages"
        );
        Ok(dropped)
    }

    pub fn last_depth(&self) -> usize {
        self.reader.last_depth()
    }
}
