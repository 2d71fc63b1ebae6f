pub mod http;

pub use http::*;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{MessageBatch, TransmitError};

/// Delivers a batch to the downstream collector. `Ok` means the collector
/// accepted the whole batch.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_batch(&self, batch: &MessageBatch) -> Result<(), TransmitError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send_batch(&self, batch: &MessageBatch) -> Result<(), TransmitError> {
        (**self).send_batch(batch).await
    }
}
