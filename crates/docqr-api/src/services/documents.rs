//! Document lifecycle: store, QR-bind, persist, retrieve, delete.
//!
//! Handlers stay thin; every rule that spans storage and the database lives here.

use crate::error::storage_to_app_error;
use crate::services::qr_codec::QrCodec;
use bytes::Bytes;
use docqr_core::models::{
    DocumentChanges, DocumentFilter, DocumentView, NewDocument, Page, MAX_MIME_TYPE_LENGTH,
    MAX_TAG_LENGTH, MAX_TITLE_LENGTH,
};
use docqr_core::AppError;
use docqr_db::{CategoryRepository, DocumentRepository, TransactionGuard};
use docqr_storage::{ByteStream, Storage, StorageError};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const DOCUMENT_NOT_FOUND: &str = "Document not found";
const FILE_MISSING: &str =
    "Document file is not available in storage. Please re-upload this document.";
const QR_MISSING: &str = "QR image is not available in storage. Re-generate this document QR.";

/// Container names for the two blob kinds.
#[derive(Debug, Clone)]
pub struct Containers {
    pub documents: String,
    pub qr_codes: String,
}

/// An uploaded file, already size- and type-checked by the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    /// Lowercased extension without the dot.
    pub extension: Option<String>,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct CreateDocument {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub file: UploadedFile,
}

/// An open blob plus what the response headers need.
pub struct BlobDownload {
    pub stream: ByteStream,
    pub file_name: String,
    pub content_type: String,
    pub content_length: Option<i64>,
}

#[derive(Clone)]
pub struct DocumentService {
    pool: PgPool,
    documents: DocumentRepository,
    categories: CategoryRepository,
    storage: Arc<dyn Storage>,
    codec: QrCodec,
    containers: Containers,
}

impl DocumentService {
    pub fn new(
        pool: PgPool,
        documents: DocumentRepository,
        categories: CategoryRepository,
        storage: Arc<dyn Storage>,
        codec: QrCodec,
        containers: Containers,
    ) -> Self {
        Self {
            pool,
            documents,
            categories,
            storage,
            codec,
            containers,
        }
    }

    pub fn containers(&self) -> &Containers {
        &self.containers
    }

    /// Upload the file and its QR image, then insert the record and tags in one transaction.
    ///
    /// Blobs written before a failed insert are left behind.
    #[tracing::instrument(skip(self, input), fields(title = %input.title, file_size = input.file.data.len()))]
    pub async fn create(&self, input: CreateDocument, user_id: Uuid) -> Result<DocumentView, AppError> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::InvalidInput("Title is required".to_string()));
        }
        check_title_length(&title)?;
        check_tag_lengths(&input.tags)?;
        if input.file.content_type.chars().count() > MAX_MIME_TYPE_LENGTH {
            return Err(AppError::InvalidInput(format!(
                "File content type must be at most {} characters",
                MAX_MIME_TYPE_LENGTH
            )));
        }
        self.ensure_category(input.category_id).await?;

        let document_id = Uuid::new_v4();
        let object_key = match &input.file.extension {
            Some(ext) => format!("{}.{}", document_id, ext),
            None => document_id.to_string(),
        };
        let file_size = input.file.data.len() as i64;

        self.storage
            .put(
                &self.containers.documents,
                &object_key,
                input.file.data,
                &input.file.content_type,
            )
            .await
            .map_err(|e| AppError::Storage(format!("Storage upload failed: {}", e)))?;

        let qr = self.codec.encode(document_id)?;
        let qr_key = format!("{}.png", document_id);
        self.storage
            .put(
                &self.containers.qr_codes,
                &qr_key,
                Bytes::from(qr.image_png),
                "image/png",
            )
            .await
            .map_err(|e| AppError::Storage(format!("QR storage upload failed: {}", e)))?;

        let new_document = NewDocument {
            id: document_id,
            title,
            description: input.description,
            category_id: input.category_id,
            file_name: input.file.file_name,
            file_size,
            mime_type: input.file.content_type,
            storage_bucket: self.containers.documents.clone(),
            storage_object_key: object_key,
            qr_code_path: qr_key,
            qr_code_data: qr.payload,
            created_by: user_id,
        };

        let mut guard = TransactionGuard::begin(&self.pool).await?;
        let tx = guard.transaction()?;
        self.documents.insert_tx(tx, &new_document).await?;
        self.documents
            .insert_tags_tx(tx, document_id, &input.tags)
            .await?;
        let view = self
            .documents
            .get_view_tx(tx, document_id)
            .await?
            .ok_or_else(|| AppError::Internal("Inserted document not readable".to_string()))?;
        guard.commit().await?;

        tracing::info!(
            document_id = %document_id,
            user_id = %user_id,
            file_size,
            "Document created"
        );

        Ok(view)
    }

    /// Apply metadata changes. The QR binding and storage linkage never change.
    #[tracing::instrument(skip(self, changes), fields(document_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        changes: DocumentChanges,
        user_id: Uuid,
    ) -> Result<DocumentView, AppError> {
        if let Some(title) = &changes.title {
            if title.trim().is_empty() {
                return Err(AppError::InvalidInput("Title cannot be empty".to_string()));
            }
            check_title_length(title.trim())?;
        }
        if let Some(tags) = &changes.tags {
            check_tag_lengths(tags)?;
        }
        if let Some(category_id) = changes.category_id {
            self.ensure_category(category_id).await?;
        }

        let mut guard = TransactionGuard::begin(&self.pool).await?;
        let tx = guard.transaction()?;
        if !self.documents.update_tx(tx, id, &changes, user_id).await? {
            guard.rollback().await?;
            return Err(AppError::NotFound(DOCUMENT_NOT_FOUND.to_string()));
        }
        let view = self
            .documents
            .get_view_tx(tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(DOCUMENT_NOT_FOUND.to_string()))?;
        guard.commit().await?;

        tracing::info!(document_id = %id, user_id = %user_id, "Document updated");
        Ok(view)
    }

    pub async fn get(&self, id: Uuid) -> Result<DocumentView, AppError> {
        self.documents
            .get_view(id)
            .await?
            .ok_or_else(|| AppError::NotFound(DOCUMENT_NOT_FOUND.to_string()))
    }

    /// Resolve a scanned QR payload to its active document.
    pub async fn get_by_qr(&self, payload: &str) -> Result<DocumentView, AppError> {
        match self.codec.decode(payload) {
            Some(id) => self.get(id).await,
            None => {
                tracing::debug!(payload_len = payload.len(), "QR payload carries no document id");
                Err(AppError::NotFound(DOCUMENT_NOT_FOUND.to_string()))
            }
        }
    }

    pub async fn list(&self, filter: &DocumentFilter) -> Result<Page<DocumentView>, AppError> {
        self.documents.list(filter).await
    }

    /// Open the primary file of an active document.
    pub async fn download(&self, id: Uuid) -> Result<BlobDownload, AppError> {
        let document = self.get(id).await?;

        let stream = self
            .open(
                &document.storage_bucket,
                &document.storage_object_key,
                FILE_MISSING,
            )
            .await?;

        Ok(BlobDownload {
            stream,
            file_name: document.file_name,
            content_type: document.mime_type,
            content_length: Some(document.file_size),
        })
    }

    /// Open the QR image of an active document.
    pub async fn download_qr(&self, id: Uuid) -> Result<BlobDownload, AppError> {
        let document = self.get(id).await?;
        let qr_key = document
            .qr_code_path
            .clone()
            .unwrap_or_else(|| format!("{}.png", id));

        let stream = self.open(&self.containers.qr_codes, &qr_key, QR_MISSING).await?;

        Ok(BlobDownload {
            stream,
            file_name: format!("qr-{}.png", id),
            content_type: "image/png".to_string(),
            content_length: None,
        })
    }

    /// Time-limited direct link to the primary file.
    pub async fn presigned_link(&self, id: Uuid, expires_in: Duration) -> Result<String, AppError> {
        let document = self.get(id).await?;
        self.storage
            .presign(
                &document.storage_bucket,
                &document.storage_object_key,
                expires_in,
            )
            .await
            .map_err(storage_to_app_error)
    }

    /// Stream a raw blob for the local-backend link route. Only the two configured
    /// containers are reachable.
    pub async fn open_blob(&self, container: &str, key: &str) -> Result<ByteStream, AppError> {
        if container != self.containers.documents && container != self.containers.qr_codes {
            return Err(AppError::NotFound("File not found".to_string()));
        }
        self.storage
            .get(container, key)
            .await
            .map_err(storage_to_app_error)
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<(), AppError> {
        if !self.documents.soft_delete(id).await? {
            return Err(AppError::NotFound(DOCUMENT_NOT_FOUND.to_string()));
        }
        tracing::info!(document_id = %id, "Document soft-deleted");
        Ok(())
    }

    /// Remove both blobs (best effort) and the record, active or soft-deleted.
    pub async fn delete_permanently(&self, id: Uuid) -> Result<(), AppError> {
        let location = self
            .documents
            .get_storage_location(id)
            .await?
            .ok_or_else(|| AppError::NotFound(DOCUMENT_NOT_FOUND.to_string()))?;

        if let Err(e) = self
            .storage
            .delete(&location.storage_bucket, &location.storage_object_key)
            .await
        {
            tracing::warn!(
                error = %e,
                document_id = %id,
                key = %location.storage_object_key,
                "Failed to delete document file from storage"
            );
        }

        if let Some(qr_key) = &location.qr_code_path {
            if let Err(e) = self.storage.delete(&self.containers.qr_codes, qr_key).await {
                tracing::warn!(
                    error = %e,
                    document_id = %id,
                    key = %qr_key,
                    "Failed to delete QR image from storage"
                );
            }
        }

        if !self.documents.delete_permanently(id).await? {
            return Err(AppError::NotFound(DOCUMENT_NOT_FOUND.to_string()));
        }

        tracing::info!(document_id = %id, "Document permanently deleted");
        Ok(())
    }

    async fn ensure_category(&self, category_id: Option<Uuid>) -> Result<(), AppError> {
        if let Some(category_id) = category_id {
            if !self.categories.exists(category_id).await? {
                return Err(AppError::InvalidInput("Category not found".to_string()));
            }
        }
        Ok(())
    }

    async fn open(
        &self,
        container: &str,
        key: &str,
        missing_message: &str,
    ) -> Result<ByteStream, AppError> {
        match self.storage.get(container, key).await {
            Ok(stream) => Ok(stream),
            Err(StorageError::NotFound(_)) => {
                tracing::warn!(container, key, "Record points at a missing blob");
                Err(AppError::FileMissingInStorage(missing_message.to_string()))
            }
            Err(e) => Err(AppError::Storage(format!("Failed to read from storage: {}", e))),
        }
    }
}

fn check_title_length(title: &str) -> Result<(), AppError> {
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

fn check_tag_lengths(tags: &[String]) -> Result<(), AppError> {
    if tags.iter().any(|t| t.chars().count() > MAX_TAG_LENGTH) {
        return Err(AppError::InvalidInput(format!(
            "Tags must be at most {} characters",
            MAX_TAG_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_limit_counts_characters() {
        assert!(check_title_length(&"é".repeat(MAX_TITLE_LENGTH)).is_ok());
        assert!(matches!(
            check_title_length(&"t".repeat(MAX_TITLE_LENGTH + 1)),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn any_long_tag_is_rejected() {
        let ok = vec!["finance".to_string(), "x".repeat(MAX_TAG_LENGTH)];
        assert!(check_tag_lengths(&ok).is_ok());
        let long = vec!["finance".to_string(), "x".repeat(MAX_TAG_LENGTH + 1)];
        assert!(matches!(check_tag_lengths(&long), Err(AppError::InvalidInput(_))));
    }
}
