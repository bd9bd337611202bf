use crate::keys::{validate_container, validate_key};
use crate::traits::{ByteStream, PutReceipt, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
    Result as ObjectResult,
};
use std::collections::HashMap;
use std::time::Duration;

/// S3-compatible storage implementation
///
/// Every container maps to a bucket of the same name, so one client is built per
/// container. Works against AWS S3 and MinIO-style endpoints.
#[derive(Clone)]
pub struct S3Storage {
    buckets: HashMap<String, AmazonS3>,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `containers` - Bucket names served by this backend
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        containers: Vec<String>,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut buckets = HashMap::with_capacity(containers.len());

        for container in containers {
            validate_container(&container)?;

            let mut builder = AmazonS3Builder::from_env()
                .with_region(region.clone())
                .with_bucket_name(container.clone());

            if let Some(ref endpoint) = endpoint_url {
                let allow_http = endpoint.starts_with("http://");
                builder = builder
                    .with_endpoint(endpoint.clone())
                    .with_allow_http(allow_http)
                    // MinIO and most self-hosted endpoints only serve path-style URLs.
                    .with_virtual_hosted_style_request(false);
            }

            let store = builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?;

            buckets.insert(container, store);
        }

        Ok(S3Storage { buckets })
    }

    fn bucket(&self, container: &str) -> StorageResult<&AmazonS3> {
        self.buckets
            .get(container)
            .ok_or_else(|| StorageError::ContainerUnavailable(container.to_string()))
    }

    fn location(key: &str) -> StorageResult<Path> {
        validate_key(key)?;
        Ok(Path::from(key.to_string()))
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn initialize(&self) -> StorageResult<()> {
        // Buckets cannot be created through object_store; probe that each one answers.
        for (container, store) in &self.buckets {
            let probe: ObjectResult<_> = store.list_with_delimiter(None).await;
            probe.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %container,
                    "S3 bucket is not reachable"
                );
                StorageError::ContainerUnavailable(format!("{}: {}", container, e))
            })?;

            tracing::info!(bucket = %container, "S3 bucket available");
        }

        Ok(())
    }

    async fn put(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<PutReceipt> {
        let store = self.bucket(container)?;
        let location = Self::location(key)?;
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        let result: ObjectResult<_> = store
            .put_opts(&location, PutPayload::from(data), opts)
            .await;

        let result = result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %container,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %container,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(PutReceipt {
            etag: result.e_tag,
            version: result.version,
        })
    }

    async fn get(&self, container: &str, key: &str) -> StorageResult<ByteStream> {
        let store = self.bucket(container)?;
        let location = Self::location(key)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => {
                StorageError::NotFound(format!("{}/{}", container, key))
            }
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %container,
                    key = %key,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bucket = container.to_string();
        let key = key.to_string();

        let stream = result.into_stream().map(move |res| match res {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 stream download error"
                );
                Err(StorageError::DownloadFailed(e.to_string()))
            }
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, container: &str, key: &str) -> StorageResult<()> {
        let store = self.bucket(container)?;
        let location = Self::location(key)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %container,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %container,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn exists(&self, container: &str, key: &str) -> StorageResult<bool> {
        let store = self.bucket(container)?;
        let location = Self::location(key)?;
        match store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn presign(
        &self,
        container: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let store = self.bucket(container)?;
        let location = Self::location(key)?;

        let url_result: ObjectResult<_> = store
            .signed_url(Method::GET, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .to_string();

        Ok(url)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> S3Storage {
        S3Storage::new(
            vec!["documents".to_string(), "qr-codes".to_string()],
            "us-east-1".to_string(),
            Some("http://localhost:9000".to_string()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn unknown_container_is_unavailable() {
        let storage = storage().await;
        let result = storage.exists("archive", "a.pdf").await;
        assert!(matches!(result, Err(StorageError::ContainerUnavailable(_))));
    }

    #[tokio::test]
    async fn traversal_keys_rejected_before_network() {
        let storage = storage().await;
        let result = storage.delete("documents", "../other/a.pdf").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn rejects_invalid_container_names() {
        let result = futures::executor::block_on(S3Storage::new(
            vec!["a/b".to_string()],
            "us-east-1".to_string(),
            None,
        ));
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }
}
