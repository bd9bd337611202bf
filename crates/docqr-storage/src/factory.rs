#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use docqr_core::Config;
use std::sync::Arc;

/// Everything a backend needs to be constructed.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub containers: Vec<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub local_path: String,
    /// Base URL of the authenticated file route used for local "presigned" links.
    pub proxy_base_url: String,
}

impl StorageSettings {
    pub fn from_config(config: &Config) -> Self {
        StorageSettings {
            backend: config.storage_backend(),
            containers: vec![
                config.documents_bucket().to_string(),
                config.qr_codes_bucket().to_string(),
            ],
            region: config.s3_region().map(String::from),
            endpoint: config.s3_endpoint().map(String::from),
            local_path: config.local_storage_path().to_string(),
            proxy_base_url: format!(
                "{}{}/documents/file",
                config.public_base_url().trim_end_matches('/'),
                config.api_prefix()
            ),
        }
    }
}

/// Create a storage backend based on configuration
///
/// The backend is not initialized; call [`Storage::initialize`] once at startup.
pub async fn create_storage(settings: &StorageSettings) -> StorageResult<Arc<dyn Storage>> {
    match settings.backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let region = settings.region.clone().ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;

            let storage =
                S3Storage::new(settings.containers.clone(), region, settings.endpoint.clone())
                    .await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            if settings.local_path.is_empty() {
                return Err(StorageError::ConfigError(
                    "LOCAL_STORAGE_PATH not configured".to_string(),
                ));
            }

            let storage = LocalStorage::new(
                settings.local_path.clone(),
                settings.containers.clone(),
                settings.proxy_base_url.clone(),
            )
            .await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
