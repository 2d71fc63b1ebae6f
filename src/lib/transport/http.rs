use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument};

use crate::core::{MessageBatch, RelayError, TransmitError};
use crate::transport::Transport;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// POSTs batches as JSON to the collector. Only `200 OK` counts as
/// delivered; the response body is ignored.
pub struct HttpTransport {
    client: reqwest::Client,
    receiver: String,
}

impl HttpTransport {
    pub fn new(receiver: impl Into<String>) -> Result<Self, RelayError> {
        Self::with_timeouts(receiver, CONNECT_TIMEOUT, REQUEST_TIMEOUT)
    }

    pub fn with_timeouts(
        receiver: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("could not build http client: {e}")))?;
        Ok(Self {
            client,
            receiver: receiver.into(),
        })
    }

    pub fn receiver(&self) -> &str {
        &self.receiver
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, batch), fields(batch_id = %batch.batch_id, size = batch.size))]
    async fn send_batch(&self, batch: &MessageBatch) -> Result<(), TransmitError> {
        let body = serde_json::to_vec(batch).map_err(|e| TransmitError::Encode(e.to_string()))?;
        let response = self
            .client
            .post(&self.receiver)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransmitError::Timeout
                } else {
                    TransmitError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransmitError::Status(status.as_u16()));
        }
        debug!(%status, "collector accepted batch");
        Ok(())
    }
}
