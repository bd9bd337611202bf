//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use docqr_core::Config;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Everything `main` needs to serve and then shut down.
pub struct Application {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    /// Finishes once `state` and the router are dropped; see [`server::finish_background_work`].
    pub audit_worker: JoinHandle<()>,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<Application> {
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.log_format());

    tracing::info!(
        environment = %config.environment(),
        storage = %config.storage_backend(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;

    let (state, audit_worker) = services::initialize_services(&config, pool, storage)?;

    let router = routes::setup_routes(&config, state.clone())?;

    Ok(Application {
        state,
        router,
        audit_worker,
    })
}
