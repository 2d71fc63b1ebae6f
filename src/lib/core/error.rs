use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Payload decode error: {0}")]
    PayloadDecode(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Queue unavailable")]
    QueueUnavailable,
    #[error("Undecodable record {key}: {reason}")]
    DecodeAnomaly { key: String, reason: String },
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<anyhow::Error> for RelayError {
    fn from(err: anyhow::Error) -> Self {
        RelayError::StoreUnavailable(format!("{err:#}"))
    }
}

/// Why a batch did not reach the collector. Never surfaces to a caller;
/// the transmitter recovers by retrying on the next interval.
#[derive(Error, Debug)]
pub enum TransmitError {
    #[error("Could not encode batch: {0}")]
    Encode(String),
    #[error("Collector timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Collector responded with status {0}")]
    Status(u16),
}
