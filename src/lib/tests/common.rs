use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde_json::{Value, json};

use crate::core::{MessageBatch, NewMessage, OverflowPolicy, Payload, QueueConfig, TransmitError};
use crate::transport::Transport;

pub fn payload(n: usize) -> Payload {
    match json!({ "n": n, "tags": ["a", "b"], "nested": { "ok": true } }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

pub fn new_message(producer: &str, n: usize) -> NewMessage {
    NewMessage::new(producer, format!("key-{n}"), "test/label", payload(n))
}

pub fn n_of(batch: &MessageBatch) -> Vec<u64> {
    batch
        .messages
        .iter()
        .map(|m| m.payload["n"].as_u64().unwrap())
        .collect()
}

pub fn config(batch_size: usize, max_queue_size: usize) -> QueueConfig {
    QueueConfig {
        interval: Duration::from_secs(3600),
        batch_size,
        max_queue_size,
        receiver: "http://127.0.0.1:9/in".to_string(),
        overflow_policy: OverflowPolicy::OnFailure,
    }
}

/// Transport that records every batch and answers with a fixed verdict.
pub struct FixedTransport {
    accept: AtomicBool,
    sent: Mutex<Vec<MessageBatch>>,
}

impl FixedTransport {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            accept: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        let transport = Self::accepting();
        transport.set_accept(false);
        transport
    }

    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<MessageBatch> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FixedTransport {
    async fn send_batch(&self, batch: &MessageBatch) -> Result<(), TransmitError> {
        self.sent.lock().unwrap().push(batch.clone());
        if self.accept.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransmitError::Status(500))
        }
    }
}

#[derive(Clone)]
struct CollectorState {
    status: StatusCode,
    delay: Duration,
    received: Arc<Mutex<Vec<Value>>>,
}

async fn collect(State(state): State<CollectorState>, Json(body): Json<Value>) -> StatusCode {
    tokio::time::sleep(state.delay).await;
    state.received.lock().unwrap().push(body);
    state.status
}

/// A collector on a free local port. Returns its URL and every body it got.
pub async fn spawn_collector(status: StatusCode, delay: Duration) -> (String, Arc<Mutex<Vec<Value>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().route("/in", post(collect)).with_state(CollectorState {
        status,
        delay,
        received: received.clone(),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/in"), received)
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
