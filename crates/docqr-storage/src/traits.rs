//! Storage abstraction trait
//!
//! Every blob backend implements [`Storage`]. Objects are addressed by a container
//! (bucket) name plus a key inside that container.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Container not available: {0}")]
    ContainerUnavailable(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked object body returned by [`Storage::get`].
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Confirmation returned by a successful write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutReceipt {
    pub etag: Option<String>,
    pub version: Option<String>,
}

/// Storage abstraction trait
///
/// The document lifecycle service is written against this trait only; the concrete
/// backend is picked once at startup by [`crate::create_storage`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Ensure the configured containers exist. Idempotent and safe to call concurrently.
    async fn initialize(&self) -> StorageResult<()>;

    /// Store `data` under `key` in `container`.
    ///
    /// A failed write leaves no committed object, but a retry is not guaranteed to be
    /// idempotent.
    async fn put(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<PutReceipt>;

    /// Open the object as a stream of chunks. `StorageError::NotFound` when absent.
    async fn get(&self, container: &str, key: &str) -> StorageResult<ByteStream>;

    /// Remove the object. Removing an absent object is not an error.
    async fn delete(&self, container: &str, key: &str) -> StorageResult<()>;

    async fn exists(&self, container: &str, key: &str) -> StorageResult<bool>;

    /// Time-limited direct-access URL.
    ///
    /// Only the object-store backend honours `expires_in`. The filesystem backend
    /// returns a stable URL routed through the API that never expires.
    async fn presign(&self, container: &str, key: &str, expires_in: Duration)
        -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
