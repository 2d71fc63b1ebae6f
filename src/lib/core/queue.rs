use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::core::ingest::decode_payload;
use crate::core::writer::spawn_writer;
use crate::core::{NewMessage, QueueConfig, QueueStats, RelayError, StatsSnapshot, Transmitter, WriterHandle};
use crate::storage::Storage;
use crate::transport::Transport;

/// What the ingestion layer holds on to. Cheap to clone.
#[derive(Clone)]
pub struct QueueHandle {
    writer: WriterHandle,
    stats: Arc<QueueStats>,
}

impl QueueHandle {
    /// Hand one message to the writer. Blocks only until the writer's
    /// one-slot inbox has room for it.
    pub async fn enqueue(&self, msg: NewMessage) -> Result<(), RelayError> {
        self.writer.enqueue(msg).await?;
        self.stats.record_received();
        Ok(())
    }

    /// Decode `body` as the payload and enqueue the resulting message.
    #[instrument(skip(self, body), fields(len = body.len()))]
    pub async fn ingest(&self, producer: &str, key: &str, label: &str, body: &[u8]) -> Result<(), RelayError> {
        let payload = decode_payload(body).inspect_err(|_| self.stats.record_rejected())?;
        self.enqueue(NewMessage::new(producer, key, label, payload)).await
    }

    /// Wait until every message enqueued so far is persisted.
    pub async fn flush(&self) -> Result<(), RelayError> {
        self.writer.flush().await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

/// A running queue: the writer loop and the transmitter, plus the means to
/// stop them or learn that the writer died.
pub struct RelayQueue<S: Storage + 'static> {
    handle: QueueHandle,
    storage: Arc<S>,
    stop_writer: watch::Sender<bool>,
    stop_transmitter: watch::Sender<bool>,
    writer_task: JoinHandle<()>,
    transmitter_task: JoinHandle<()>,
    fatal: Option<oneshot::Receiver<RelayError>>,
}

impl<S: Storage + 'static> RelayQueue<S> {
    pub fn start<T: Transport + 'static>(storage: Arc<S>, transport: T, config: QueueConfig) -> Result<Self, RelayError> {
        config.validate()?;
        let stats = Arc::new(QueueStats::default());

        let (writer, stop_writer, writer_join) = spawn_writer(storage.clone());
        let (fatal_tx, fatal_rx) = oneshot::channel();
        let writer_task = tokio::spawn(async move {
            match writer_join.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    let _ = fatal_tx.send(e);
                }
                Err(e) => {
                    let _ = fatal_tx.send(RelayError::StoreUnavailable(format!("writer task failed: {e}")));
                }
            }
        });

        let (stop_transmitter, transmitter_shutdown) = watch::channel(false);
        let transmitter = Transmitter::new(storage.clone(), transport, writer.clone(), config, stats.clone());
        let transmitter_task = tokio::spawn(transmitter.run(transmitter_shutdown));

        info!("relay queue started");
        Ok(Self {
            handle: QueueHandle { writer, stats },
            storage,
            stop_writer,
            stop_transmitter,
            writer_task,
            transmitter_task,
            fatal: Some(fatal_rx),
        })
    }

    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.handle.stats()
    }

    /// Resolves if the writer hit a store error. After that nothing is
    /// persisted any more and the process should go down.
    ///
    /// Cancel safe: dropping the future leaves the error for a later call or
    /// for [`RelayQueue::shutdown`].
    pub async fn fatal(&mut self) -> RelayError {
        let Some(rx) = self.fatal.as_mut() else {
            return std::future::pending().await;
        };
        let outcome = rx.await;
        self.fatal = None;
        match outcome {
            Ok(e) => e,
            Err(_) => std::future::pending().await,
        }
    }

    /// Stop transmitting, then let the writer apply every command it has
    /// already accepted before returning.
    pub async fn shutdown(self) -> Result<(), RelayError> {
        info!("relay queue shutting down");
        let _ = self.stop_transmitter.send(true);
        if let Err(e) = self.transmitter_task.await {
            warn!(error = %e, "transmitter task ended abnormally");
        }

        let _ = self.stop_writer.send(true);
        if let Err(e) = self.writer_task.await {
            error!(error = %e, "writer supervisor ended abnormally");
        }
        if let Some(mut rx) = self.fatal {
            if let Ok(e) = rx.try_recv() {
                return Err(e);
            }
        }
        info!("relay queue stopped");
        Ok(())
    }
}
