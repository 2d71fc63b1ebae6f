use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::core::{NewMessage, RelayError, stopped};
use crate::storage::Storage;

/// Commands for the writer loop, applied strictly in arrival order.
pub(crate) enum WriterCommand {
    Enqueue(NewMessage),
    Remove {
        count: usize,
        reply: oneshot::Sender<usize>,
    },
    Flush {
        reply: oneshot::Sender<()>,
    },
}

/// Sending side of the writer loop. Cheap to clone; every clone feeds the
/// same single writer.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<WriterCommand>,
}

impl WriterHandle {
    /// Hand a message to the writer. Returns once it sits in the writer's
    /// inbox, not once it is on disk.
    pub async fn enqueue(&self, msg: NewMessage) -> Result<(), RelayError> {
        self.tx
            .send(WriterCommand::Enqueue(msg))
            .await
            .map_err(|_| RelayError::QueueUnavailable)
    }

    /// Delete the `count` oldest entries. Resolves with how many were
    /// actually deleted, which is less than `count` when the queue runs dry.
    pub async fn remove(&self, count: usize) -> Result<usize, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WriterCommand::Remove { count, reply })
            .await
            .map_err(|_| RelayError::QueueUnavailable)?;
        rx.await.map_err(|_| RelayError::QueueUnavailable)
    }

    /// Wait until every command sent before this one has been applied.
    pub async fn flush(&self) -> Result<(), RelayError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WriterCommand::Flush { reply })
            .await
            .map_err(|_| RelayError::QueueUnavailable)?;
        rx.await.map_err(|_| RelayError::QueueUnavailable)
    }
}

/// The only task allowed to write to the store.
pub(crate) struct Writer<S: Storage + 'static> {
    storage: Arc<S>,
    inbound: mpsc::Receiver<WriterCommand>,
    shutdown: watch::Receiver<bool>,
}

/// Spawn a writer over `storage`. The join handle resolves with an error
/// only when a store write failed, after which nothing else is written.
pub(crate) fn spawn_writer<S: Storage + 'static>(
    storage: Arc<S>,
) -> (WriterHandle, watch::Sender<bool>, JoinHandle<Result<(), RelayError>>) {
    // One slot: a sender waits until the writer has picked up the previous
    // command, so a slow store pushes back on ingestion.
    let (tx, inbound) = mpsc::channel(1);
    let (stop, shutdown) = watch::channel(false);
    let writer = Writer {
        storage,
        inbound,
        shutdown,
    };
    let task = tokio::spawn(writer.run());
    (WriterHandle { tx }, stop, task)
}

impl<S: Storage + 'static> Writer<S> {
    async fn run(mut self) -> Result<(), RelayError> {
        info!("writer started");
        loop {
            tokio::select! {
                cmd = self.inbound.recv() => match cmd {
                    Some(cmd) => self.apply(cmd).await?,
                    None => {
                        info!("all queue handles dropped, writer stopping");
                        return Ok(());
                    }
                },
                _ = stopped(&mut self.shutdown) => break,
            }
        }

        // Refuse new commands but finish everything already accepted.
        self.inbound.close();
        let mut drained = 0usize;
        while let Some(cmd) = self.inbound.recv().await {
            self.apply(cmd).await?;
            drained += 1;
        }
        info!(drained, "writer stopped");
        Ok(())
    }

    async fn apply(&mut self, cmd: WriterCommand) -> Result<(), RelayError> {
        match cmd {
            WriterCommand::Enqueue(msg) => {
                let stored = self
                    .storage
                    .insert_message(msg, Utc::now(), Uuid::new_v4())
                    .await
                    .map_err(|e| {
                        error!(error = %e, "store write failed, writer giving up");
                        RelayError::from(e)
                    })?;
                debug!(sequence = %stored.sequence, id = %stored.id, producer = %stored.producer, "message persisted");
            }
            WriterCommand::Remove { count, reply } => {
                let removed = self.storage.remove_oldest(count).await.map_err(|e| {
                    error!(error = %e, count, "store delete failed, writer giving up");
                    RelayError::from(e)
                })?;
                debug!(requested = count, removed, "removed oldest messages");
                let _ = reply.send(removed);
            }
            WriterCommand::Flush { reply } => {
                let _ = reply.send(());
            }
        }
        Ok(())
    }
}
