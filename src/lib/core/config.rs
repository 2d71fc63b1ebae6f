use std::time::Duration;

use crate::core::RelayError;

/// What to do when the queue holds more than `max_queue_size` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the oldest surplus only after a failed transmission.
    #[default]
    OnFailure,
    /// Also drop the surplus left over after a successful transmission.
    Always,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub interval: Duration,
    pub batch_size: usize,
    pub max_queue_size: usize,
    pub receiver: String,
    pub overflow_policy: OverflowPolicy,
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.batch_size == 0 {
            return Err(RelayError::Config("batch size must be at least 1".into()));
        }
        if self.interval.is_zero() {
            return Err(RelayError::Config("interval must be greater than zero".into()));
        }
        if self.receiver.is_empty() {
            return Err(RelayError::Config("receiver url is empty".into()));
        }
        Ok(())
    }
}
