//! Health check and API root.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; "healthy", "timeout" or the error text.
async fn run_check<F, E>(f: F) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(CHECK_TIMEOUT, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("unhealthy: {}", e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// OK or DEGRADED
    pub status: String,
    /// Configured storage backend (local or s3)
    pub storage: String,
    pub database: String,
    pub storage_status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RootResponse {
    pub message: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "All dependencies reachable", body = HealthResponse),
        (status = 503, description = "Database or storage unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = run_check(async {
        sqlx::query("SELECT 1")
            .execute(&state.db.pool)
            .await
            .map(|_| ())
    })
    .await;

    let documents_container = state.documents.containers().documents.clone();
    let storage_status = run_check(async {
        state
            .storage
            .exists(&documents_container, "health-probe")
            .await
            .map(|_| ())
    })
    .await;

    let healthy = database == "healthy" && storage_status == "healthy";
    if !healthy {
        tracing::warn!(database = %database, storage = %storage_status, "Health check degraded");
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "OK" } else { "DEGRADED" }.to_string(),
            storage: state.storage.backend_type().to_string(),
            database,
            storage_status,
            timestamp: Utc::now(),
        }),
    )
}

#[utoipa::path(
    get,
    path = "/api",
    tag = "health",
    responses((status = 200, description = "API banner", body = RootResponse))
)]
pub async fn api_root() -> impl IntoResponse {
    Json(RootResponse {
        message: "DOCQR API v1".to_string(),
    })
}
