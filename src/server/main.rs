use std::sync::Arc;

use clap::Parser;
use prk_relay::adapters::HttpServer;
use prk_relay::config::Settings;
use prk_relay::core::RelayQueue;
use prk_relay::storage::sqlite::SQLiteStorage;
use prk_relay::transport::HttpTransport;
use tokio::sync::oneshot;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let settings = Settings::parse();
    let config = settings.queue_config()?;
    tracing::info!("Starting relay...");

    let storage = Arc::new(SQLiteStorage::new(settings.store_path(), 4).await?);
    let transport = HttpTransport::new(config.receiver.clone())?;
    let mut queue = RelayQueue::start(storage.clone(), transport, config)?;

    let (stop_http, http_stopped) = oneshot::channel::<()>();
    let server = HttpServer::new(queue.handle(), settings.http_config()).await?;
    let server_handle = tokio::spawn(server.run(async move {
        let _ = http_stopped.await;
    }));

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Exiting on interrupt...");
        }
        err = queue.fatal() => {
            tracing::error!(error = %err, "store failure, terminating");
            std::process::exit(1);
        }
    }

    // No new messages once the listener is gone, then drain the writer.
    let _ = stop_http.send(());
    match server_handle.await {
        Ok(Err(e)) => tracing::warn!(error = %e, "http server stopped with error"),
        Err(e) => tracing::warn!(error = %e, "http server task failed"),
        Ok(Ok(())) => {}
    }
    if let Err(e) = queue.shutdown().await {
        tracing::error!(error = %e, "store failure during shutdown");
        std::process::exit(1);
    }
    storage.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
