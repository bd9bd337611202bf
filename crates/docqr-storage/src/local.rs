use crate::keys::{validate_container, validate_key};
use crate::traits::{ByteStream, PutReceipt, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// Each container is a directory directly under `base_path`.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    containers: Vec<String>,
    proxy_base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "./uploads")
    /// * `containers` - Container names served by this backend
    /// * `proxy_base_url` - API route that streams local files
    ///   (e.g., "http://localhost:3000/api/documents/file")
    pub async fn new(
        base_path: impl Into<PathBuf>,
        containers: Vec<String>,
        proxy_base_url: String,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();

        for container in &containers {
            validate_container(container)?;
        }

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            containers,
            proxy_base_url: proxy_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn container_dir(&self, container: &str) -> StorageResult<PathBuf> {
        validate_container(container)?;
        if !self.containers.iter().any(|c| c == container) {
            return Err(StorageError::ContainerUnavailable(container.to_string()));
        }
        Ok(self.base_path.join(container))
    }

    /// Convert container + key to a filesystem path with traversal checks.
    fn key_to_path(&self, container: &str, key: &str) -> StorageResult<PathBuf> {
        let dir = self.container_dir(container)?;
        validate_key(key)?;

        let path = dir.join(key);

        if let (Ok(base), Ok(canonical)) = (self.base_path.canonicalize(), path.canonicalize()) {
            if canonical.strip_prefix(&base).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    async fn path_exists(path: &PathBuf) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn initialize(&self) -> StorageResult<()> {
        for container in &self.containers {
            let dir = self.base_path.join(container);
            fs::create_dir_all(&dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create container directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        tracing::info!(
            base_path = %self.base_path.display(),
            containers = ?self.containers,
            "Local storage containers initialized"
        );

        Ok(())
    }

    async fn put(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<PutReceipt> {
        let path = self.key_to_path(container, key)?;
        let dir = self.base_path.join(container);
        if !Self::path_exists(&dir).await {
            return Err(StorageError::ContainerUnavailable(container.to_string()));
        }

        let size = data.len();
        let start = std::time::Instant::now();

        // Write next to the target and rename so readers never observe a partial file.
        let tmp_path = dir.join(format!(".{}.partial", key));
        let write_result = async {
            let mut file = fs::File::create(&tmp_path).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to create file {}: {}",
                    tmp_path.display(),
                    e
                ))
            })?;

            file.write_all(&data).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write file {}: {}",
                    tmp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to sync file {}: {}",
                    tmp_path.display(),
                    e
                ))
            })?;

            fs::rename(&tmp_path, &path).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to move file into place {}: {}",
                    path.display(),
                    e
                ))
            })
        }
        .await;

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path).await;
            tracing::error!(
                error = %e,
                container = %container,
                key = %key,
                size_bytes = size,
                "Local storage upload failed"
            );
            return Err(e);
        }

        tracing::info!(
            path = %path.display(),
            container = %container,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(PutReceipt::default())
    }

    async fn get(&self, container: &str, key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(container, key)?;

        if !Self::path_exists(&path).await {
            return Err(StorageError::NotFound(format!("{}/{}", container, key)));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let path_display = path.display().to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(path = %path_display, error = %e, "Local storage stream read error");
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, container: &str, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(container, key)?;

        if !Self::path_exists(&path).await {
            return Ok(());
        }

        match fs::remove_file(&path).await {
            Ok(()) => {}
            // Lost a race with another delete.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        tracing::info!(
            container = %container,
            key = %key,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, container: &str, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(container, key)?;
        Ok(Self::path_exists(&path).await)
    }

    async fn presign(
        &self,
        container: &str,
        key: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        self.key_to_path(container, key)?;
        Ok(format!(
            "{}/{}/{}",
            self.proxy_base_url,
            urlencoding::encode(container),
            urlencoding::encode(key)
        ))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tempfile::tempdir;

    const PROXY: &str = "http://localhost:3000/api/documents/file";

    async fn storage(dir: &std::path::Path) -> LocalStorage {
        let storage = LocalStorage::new(
            dir,
            vec!["documents".to_string(), "qr-codes".to_string()],
            PROXY.to_string(),
        )
        .await
        .unwrap();
        storage.initialize().await.unwrap();
        storage
    }

    async fn read_all(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_local_storage_put_get() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .put("documents", "a.txt", Bytes::from_static(b"test data"), "text/plain")
            .await
            .unwrap();

        let stream = storage.get("documents", "a.txt").await.unwrap();
        assert_eq!(read_all(stream).await, b"test data");
        assert!(!dir.path().join("documents/.a.txt.partial").exists());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let (a, b) = tokio::join!(storage.initialize(), storage.initialize());
        assert!(a.is_ok() && b.is_ok());
        assert!(dir.path().join("qr-codes").is_dir());
    }

    #[tokio::test]
    async fn test_put_without_initialized_container_fails() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(
            dir.path(),
            vec!["documents".to_string()],
            PROXY.to_string(),
        )
        .await
        .unwrap();

        let result = storage
            .put("documents", "a.txt", Bytes::from_static(b"x"), "text/plain")
            .await;
        assert!(matches!(result, Err(StorageError::ContainerUnavailable(_))));
    }

    #[tokio::test]
    async fn test_unknown_container_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.get("secrets", "a.txt").await;
        assert!(matches!(result, Err(StorageError::ContainerUnavailable(_))));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.get("documents", "../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("documents", "../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("documents", "/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.get("documents", "missing.pdf").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_storage_delete_nonexistent() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        assert!(storage.delete("documents", "nonexistent.txt").await.is_ok());
    }

    #[tokio::test]
    async fn test_local_storage_exists_and_delete() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .put("qr-codes", "q.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        assert!(storage.exists("qr-codes", "q.png").await.unwrap());
        storage.delete("qr-codes", "q.png").await.unwrap();
        assert!(!storage.exists("qr-codes", "q.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_presign_returns_stable_proxy_url() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let short = storage
            .presign("documents", "a b.pdf", Duration::from_secs(1))
            .await
            .unwrap();
        let long = storage
            .presign("documents", "a b.pdf", Duration::from_secs(86_400))
            .await
            .unwrap();

        assert_eq!(short, long);
        assert_eq!(short, format!("{}/documents/a%20b.pdf", PROXY));
    }
}
