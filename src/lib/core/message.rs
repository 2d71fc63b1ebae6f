use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Arbitrary JSON object carried by a message. The queue never looks inside.
pub type Payload = Map<String, Value>;

/// A message as handed over by the ingestion layer, before the writer
/// stamps it with a sequence, a time and an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub producer: String,
    pub key: String,
    pub label: String,
    pub payload: Payload,
}

impl NewMessage {
    pub fn new(
        producer: impl Into<String>,
        key: impl Into<String>,
        label: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            producer: producer.into(),
            key: key.into(),
            label: label.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sequence: String,   // encoded store key, sorts in arrival order
    pub time: DateTime<Utc>,
    pub id: String,
    pub producer: String,
    pub label: String,
    pub key: String,
    pub payload: Payload,
}

impl Message {
    pub fn stamp(new: NewMessage, sequence: String, time: DateTime<Utc>, id: Uuid) -> Self {
        Self {
            sequence,
            time,
            id: id.to_string(),
            producer: new.producer,
            label: new.label,
            key: new.key,
            payload: new.payload,
        }
    }
}

/// Snapshot of the oldest queued messages taken for one transmission attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBatch {
    pub batch_id: String,
    pub size: usize,
    pub messages: Vec<Message>,
}

impl MessageBatch {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            batch_id: Uuid::new_v4().to_string(),
            size: messages.len(),
            messages,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}
