use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use anyhow::Context;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tokio::net;
use tracing::{info, warn};

use crate::core::{QueueHandle, RelayError, StatsSnapshot};

const SYNC_ROUTE: &str = "/rx/{producer}/{key}/{*label}";
const SYNC_ROUTE_BARE: &str = "/rx/{producer}/{key}/";
const ASYNC_ROUTE: &str = "/rxa/{producer}/{key}/{*label}";
const ASYNC_ROUTE_BARE: &str = "/rxa/{producer}/{key}/";

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub addr: SocketAddr,
    /// Log every request with its status and latency.
    pub verbose: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub queue: QueueHandle,
}

#[derive(Debug, Deserialize)]
pub struct RxParams {
    pub producer: String,
    pub key: String,
    #[serde(default)]
    pub label: String,
}

impl RxParams {
    /// The label as producers have always seen it: the path remainder with
    /// its leading slash.
    pub fn wire_label(&self) -> String {
        format!("/{}", self.label)
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match self {
            RelayError::PayloadDecode(_) => StatusCode::BAD_REQUEST,
            RelayError::QueueUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "status": "FAIL", "message": self.to_string() }));
        (status, body).into_response()
    }
}

pub async fn rx(
    State(state): State<AppState>,
    Path(params): Path<RxParams>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, RelayError> {
    state
        .queue
        .ingest(&params.producer, &params.key, &params.wire_label(), &body)
        .await
        .inspect_err(|e| warn!(error = %e, producer = %params.producer, "message processing error"))?;
    Ok(Json(json!({ "status": "OK" })))
}

/// Answers immediately and leaves decoding and enqueueing to a background
/// task. Failures are only visible in the log and in the stats.
pub async fn rx_async(
    State(state): State<AppState>,
    Path(params): Path<RxParams>,
    body: Bytes,
) -> Json<serde_json::Value> {
    tokio::spawn(async move {
        if let Err(e) = state
            .queue
            .ingest(&params.producer, &params.key, &params.wire_label(), &body)
            .await
        {
            warn!(error = %e, producer = %params.producer, "async message processing error");
        }
    });
    Json(json!({ "status": "OK" }))
}

/// Permissive CORS preflight for browser producers.
pub async fn preflight() -> Response {
    let mut response = Json(json!({})).into_response();
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("access-control-allow-origin, access-control-allow-headers, content-type"),
    );
    response
}

pub async fn status(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.queue.stats())
}

async fn health_route() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();
    let response = next.run(request).await;
    info!(
        %method,
        %uri,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "http request"
    );
    response
}

pub fn router(queue: QueueHandle, verbose: bool) -> Router {
    let router = Router::new()
        .route(SYNC_ROUTE, post(rx).options(preflight))
        .route(SYNC_ROUTE_BARE, post(rx).options(preflight))
        .route(ASYNC_ROUTE, post(rx_async).options(preflight))
        .route(ASYNC_ROUTE_BARE, post(rx_async).options(preflight))
        .route("/status", get(status))
        .route("/health", get(health_route))
        .with_state(AppState { queue });
    if verbose {
        router.layer(middleware::from_fn(log_request))
    } else {
        router
    }
}

pub struct HttpServer {
    router: Router,
    listener: net::TcpListener,
}

impl HttpServer {
    pub async fn new(queue: QueueHandle, config: HttpServerConfig) -> anyhow::Result<Self> {
        let listener = net::TcpListener::bind(config.addr)
            .await
            .with_context(|| format!("failed to listen on {}", config.addr))?;
        Ok(Self {
            router: router(queue, config.verbose),
            listener,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        info!(addr = %self.listener.local_addr()?, "listening");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("received error from running server")?;
        Ok(())
    }
}
