//! Storage setup and initialization

use anyhow::{Context, Result};
use docqr_core::Config;
use docqr_storage::{create_storage, Storage, StorageSettings};
use std::sync::Arc;

/// Build the configured backend and make sure both containers are usable.
///
/// An unreachable backend at startup is logged, not fatal: uploads and downloads fail
/// with storage errors until it comes back, and `/health` reports it.
pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing storage...");
    let settings = StorageSettings::from_config(config);
    let storage = create_storage(&settings)
        .await
        .context("Failed to create storage backend")?;

    match storage.initialize().await {
        Ok(()) => tracing::info!(
            backend = %storage.backend_type(),
            documents = %config.documents_bucket(),
            qr_codes = %config.qr_codes_bucket(),
            "Storage initialized successfully"
        ),
        Err(e) => tracing::warn!(
            error = %e,
            backend = %storage.backend_type(),
            "Storage initialization failed, continuing without verified containers"
        ),
    }

    Ok(storage)
}
