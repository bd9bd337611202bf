//! Server startup and graceful shutdown

use crate::services::audit::wait_for_drain;
use crate::state::AppState;
use anyhow::Result;
use axum::Router;
use docqr_core::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const AUDIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Serve until Ctrl+C or SIGTERM, then drain in-flight requests.
pub async fn start_server(config: &Config, app: Router) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port());
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        api_prefix = %config.api_prefix(),
        storage_backend = %config.storage_backend(),
        max_file_mb = config.max_file_size_bytes() / 1024 / 1024,
        allowed_file_types = %config.allowed_file_types().join(","),
        "Server ready and accepting connections"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// After the server has stopped: release the last audit queue handle, let the worker
/// write its backlog, then close the pool.
pub async fn finish_background_work(state: Arc<AppState>, audit_worker: JoinHandle<()>) {
    let pool = state.db.pool.clone();
    drop(state);

    if wait_for_drain(audit_worker, AUDIT_DRAIN_TIMEOUT).await {
        tracing::info!("Audit log flushed");
    }

    pool.close().await;
    tracing::info!("Database pool closed");
}

/// Resolves on Ctrl+C (SIGINT) or SIGTERM. A handler that cannot be installed is logged
/// and that signal is ignored.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
