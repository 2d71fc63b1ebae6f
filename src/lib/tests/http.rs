use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::oneshot;

use super::common::{FixedTransport, config, eventually};
use crate::adapters::{HttpServer, HttpServerConfig};
use crate::core::{BatchReader, RelayQueue};
use crate::storage::memory::MemoryStorage;

struct Harness {
    base: String,
    queue: RelayQueue<MemoryStorage>,
    storage: Arc<MemoryStorage>,
    _stop: oneshot::Sender<()>,
}

async fn serve() -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let queue = RelayQueue::start(storage.clone(), FixedTransport::failing(), config(10, 100)).unwrap();
    let server = HttpServer::new(
        queue.handle(),
        HttpServerConfig {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            verbose: true,
        },
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(server.run(async move {
        let _ = stopped.await;
    }));
    Harness {
        base: format!("http://{addr}"),
        queue,
        storage,
        _stop: stop,
    }
}

#[tokio::test]
async fn rx_enqueues_decoded_payload() {
    let h = serve().await;
    let response = reqwest::Client::new()
        .post(format!("{}/rx/svcA/user-1/signup/web", h.base))
        .body(r#"{"email":"a@example.com","plan":{"tier":2}}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({ "status": "OK" }));

    h.queue.handle().flush().await.unwrap();
    let read = BatchReader::new(h.storage.clone()).read_batch(10).await.unwrap();
    assert_eq!(read.batch.size, 1);
    let msg = &read.batch.messages[0];
    assert_eq!(msg.producer, "svcA");
    assert_eq!(msg.key, "user-1");
    assert_eq!(msg.label, "/signup/web");
    assert_eq!(msg.payload["plan"]["tier"], 2);
}

#[tokio::test]
async fn rx_accepts_an_empty_label() {
    let h = serve().await;
    let response = reqwest::Client::new()
        .post(format!("{}/rx/svcA/user-1/", h.base))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    h.queue.handle().flush().await.unwrap();
    let read = BatchReader::new(h.storage.clone()).read_batch(10).await.unwrap();
    assert_eq!(read.batch.size, 1);
    assert_eq!(read.batch.messages[0].label, "/");
}

#[tokio::test]
async fn rx_rejects_undecodable_payload() {
    let h = serve().await;
    let client = reqwest::Client::new();
    for body in ["this is not json", "[1,2,3]"] {
        let response = client
            .post(format!("{}/rx/svcA/k/l", h.base))
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "FAIL");
        assert!(body["message"].as_str().unwrap().contains("Payload decode error"));
    }

    h.queue.handle().flush().await.unwrap();
    assert_eq!(h.storage.len().await, 0);
    let stats = h.queue.stats();
    assert_eq!(stats.rejected, 2);
    assert_eq!(stats.received, 0);
}

#[tokio::test]
async fn rxa_answers_before_persisting() {
    let h = serve().await;
    let response = reqwest::Client::new()
        .post(format!("{}/rxa/svcB/k/l", h.base))
        .body(r#"{"async":true}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let storage = h.storage.clone();
    assert!(eventually(|| {
        let storage = storage.clone();
        async move { storage.len().await == 1 }
    })
    .await);
}

#[tokio::test]
async fn preflight_allows_any_origin() {
    let h = serve().await;
    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{}/rx/svcA/k/l", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert!(
        response.headers()["access-control-allow-headers"]
            .to_str()
            .unwrap()
            .contains("content-type")
    );
}

#[tokio::test]
async fn status_and_health_routes() {
    let h = serve().await;
    let client = reqwest::Client::new();
    client
        .post(format!("{}/rx/svcA/k/l", h.base))
        .body("{}")
        .send()
        .await
        .unwrap();

    let health = client.get(format!("{}/health", h.base)).send().await.unwrap();
    assert_eq!(health.status(), 200);
    assert_eq!(health.text().await.unwrap(), "OK");

    let status: Value = client
        .get(format!("{}/status", h.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["received"], 1);
    assert!(status["depth"].is_u64());
}
