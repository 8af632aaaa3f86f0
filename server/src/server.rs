//! Bootstrap for the relay server runtime.

use axum::routing::get;
use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::relay_loop::{spawn_relay, RelayCommand};
use crate::ws::{ws_handler, AppState};

/// Spawn the relay loop and build the HTTP router in front of it.
pub fn build(config: ServerConfig) -> (Router, mpsc::Sender<RelayCommand>, JoinHandle<()>) {
    let outbound_buffer = config.outbound_buffer;
    let (relay_tx, relay_handle) = spawn_relay(config);

    let app_state = AppState {
        relay_tx: relay_tx.clone(),
        outbound_buffer,
    };
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    (app, relay_tx, relay_handle)
}

/// Serve on `listener` until `shutdown` resolves, then close every session.
pub async fn serve<F>(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr()?;
    let (app, relay_tx, relay_handle) = build(config);

    tracing::info!(%address, "listening");

    let shutdown_tx = relay_tx.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("shutdown requested");
            close_sessions(&shutdown_tx).await;
        })
        .await;

    // Covers the case where serving failed before the shutdown future ran.
    close_sessions(&relay_tx).await;
    drop(relay_tx);
    let _ = relay_handle.await;

    result.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

async fn close_sessions(relay_tx: &mpsc::Sender<RelayCommand>) {
    let (done, done_rx) = oneshot::channel();
    if relay_tx.send(RelayCommand::Shutdown { done }).await.is_err() {
        return; // Relay loop already stopped
    }
    if let Ok(closed) = done_rx.await {
        tracing::info!(closed, "sessions closed");
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
