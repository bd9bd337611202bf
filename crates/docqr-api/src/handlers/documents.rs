use crate::auth::models::AuthUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::MessageResponse;
use crate::middleware::audit::{AuditBody, AuditResourceId};
use crate::services::documents::{BlobDownload, CreateDocument, DocumentService, UploadedFile};
use crate::state::UploadLimits;
use crate::utils::upload::{
    field_text, sanitize_filename, validate_file_extension, validate_file_size,
};
use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, Response, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, Utc};
use docqr_core::models::{
    normalize_tags, DocumentChanges, DocumentFilter, DocumentView, SortField, SortOrder,
    MAX_PAGE, MAX_PAGE_LIMIT,
};
use docqr_core::AppError;
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::time::Duration;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

const DEFAULT_LINK_EXPIRY_SECS: u64 = 86_400;
const MIN_LINK_EXPIRY_SECS: u64 = 60;
const MAX_LINK_EXPIRY_SECS: u64 = 604_800;

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentResponse {
    pub document: DocumentView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentMessageResponse {
    pub message: String,
    pub document: DocumentView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentView>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PresignedLinkResponse {
    pub url: String,
    pub expires_in: u64,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListDocumentsQuery {
    /// Case-insensitive match on title or description
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    /// Comma-separated; matches documents carrying any listed tag
    pub tags: Option<String>,
    pub created_by: Option<Uuid>,
    /// RFC 3339 timestamp or YYYY-MM-DD
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// created_at, updated_at, title or file_size
    pub sort_by: Option<String>,
    /// ASC or DESC
    pub sort_order: Option<String>,
}

impl ListDocumentsQuery {
    fn into_filter(self) -> Result<DocumentFilter, AppError> {
        let mut filter = DocumentFilter::default();

        if let Some(page) = self.page {
            if !(1..=MAX_PAGE).contains(&page) {
                return Err(AppError::InvalidInput(
                    format!("Page must be 1-{}", MAX_PAGE),
                ));
            }
            filter.page = page;
        }
        if let Some(limit) = self.limit {
            if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
                return Err(AppError::InvalidInput("Limit must be 1-100".to_string()));
            }
            filter.limit = limit;
        }
        if let Some(sort_by) = self.sort_by.as_deref() {
            filter.sort_by = sort_by.parse::<SortField>().map_err(AppError::InvalidInput)?;
        }
        if let Some(sort_order) = self.sort_order.as_deref() {
            filter.sort_order = sort_order.parse::<SortOrder>().map_err(AppError::InvalidInput)?;
        }

        filter.search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        filter.category_id = self.category_id;
        filter.created_by = self.created_by;
        filter.tags = self
            .tags
            .map(|raw| normalize_tags(raw.split(',')))
            .unwrap_or_default();
        filter.date_from = self.date_from.as_deref().map(parse_date).transpose()?;
        filter.date_to = self.date_to.as_deref().map(parse_date).transpose()?;

        Ok(filter)
    }
}

/// Accept a full timestamp or a bare date (midnight UTC).
fn parse_date(raw: &str) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| AppError::InvalidInput(format!("Invalid date: {}", raw)))
}

/// Tags as a JSON array or a comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TagInput {
    List(Vec<String>),
    Csv(String),
}

impl TagInput {
    fn normalized(self) -> Vec<String> {
        match self {
            TagInput::List(tags) => normalize_tags(tags),
            TagInput::Csv(raw) => normalize_tags(raw.split(',')),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    /// `null` clears the category
    #[serde(default, deserialize_with = "present_or_null")]
    #[schema(value_type = Option<String>)]
    pub category_id: Option<Option<Uuid>>,
    #[schema(value_type = Option<Vec<String>>)]
    pub tags: Option<TagInput>,
}

/// Tells an explicit `null` apart from an absent field.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Uuid>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LinkQuery {
    /// Lifetime in seconds (60 to 604800, default 86400)
    pub expires_in: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/api/documents",
    tag = "documents",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Document uploaded", body = DocumentMessageResponse),
        (status = 400, description = "Invalid input, file too large or type not allowed", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Storage or database failure", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(service, limits, multipart), fields(user_id = %auth.id()))]
pub async fn upload_document(
    State(service): State<DocumentService>,
    State(limits): State<UploadLimits>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;
    let mut category_raw: Option<String> = None;
    let mut tags: Vec<String> = Vec::new();
    let mut file: Option<UploadedFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = sanitize_filename(field.file_name().unwrap_or("file"));
                let extension = validate_file_extension(&file_name, &limits.allowed_extensions)?;
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();

                let mut data = BytesMut::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read file: {}", e)))?
                {
                    validate_file_size(data.len() + chunk.len(), limits.max_file_size)?;
                    data.extend_from_slice(&chunk);
                }

                file = Some(UploadedFile {
                    file_name,
                    extension,
                    content_type,
                    data: data.freeze(),
                });
            }
            "title" => title = Some(field_text(field).await?),
            "description" => description = Some(field_text(field).await?),
            "categoryId" => category_raw = Some(field_text(field).await?),
            "tags" | "tags[]" => tags.extend(
                field_text(field)
                    .await?
                    .split(',')
                    .map(|t| t.to_string()),
            ),
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    let file = file.ok_or_else(|| AppError::InvalidInput("No file uploaded".to_string()))?;
    let title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::InvalidInput("Title is required".to_string()))?;
    let description = description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    let category_id = match category_raw.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            Uuid::parse_str(raw)
                .map_err(|_| AppError::InvalidInput("Invalid category ID".to_string()))?,
        ),
    };
    let tags = normalize_tags(tags);

    let audit_body = json!({
        "title": title,
        "description": description,
        "categoryId": category_id,
        "tags": tags,
        "fileName": file.file_name,
    });

    let document = service
        .create(
            CreateDocument {
                title,
                description,
                category_id,
                tags,
                file,
            },
            auth.id(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Extension(AuditResourceId(document.id)),
        Extension(AuditBody(audit_body)),
        Json(DocumentMessageResponse {
            message: "Document uploaded successfully".to_string(),
            document,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/documents",
    tag = "documents",
    params(ListDocumentsQuery),
    responses(
        (status = 200, description = "Filtered page of active documents", body = DocumentListResponse),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_documents(
    State(service): State<DocumentService>,
    Query(query): Query<ListDocumentsQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let filter = query.into_filter()?;
    let page = service.list(&filter).await?;

    Ok(Json(DocumentListResponse {
        documents: page.items,
        total: page.total,
        page: page.page,
        limit: page.limit,
    }))
}

#[utoipa::path(
    get,
    path = "/api/documents/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document", body = DocumentResponse),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_document(
    State(service): State<DocumentService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let document = service.get(id).await?;
    Ok(Json(DocumentResponse { document }))
}

#[utoipa::path(
    get,
    path = "/api/documents/qr/{payload}",
    tag = "documents",
    params(("payload" = String, Path, description = "Scanned QR text, URL-encoded")),
    responses(
        (status = 200, description = "Document bound to the code", body = DocumentResponse),
        (status = 404, description = "No active document for this code", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_document_by_qr(
    State(service): State<DocumentService>,
    Path(payload): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    // Scanners sometimes encode the payload twice.
    let payload = urlencoding::decode(&payload)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(payload);

    let document = service.get_by_qr(&payload).await?;

    Ok((
        Extension(AuditResourceId(document.id)),
        Json(DocumentResponse { document }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/documents/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = UpdateDocumentRequest,
    responses(
        (status = 200, description = "Document updated", body = DocumentMessageResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(service, request), fields(user_id = %auth.id(), document_id = %id))]
pub async fn update_document(
    State(service): State<DocumentService>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateDocumentRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let changes = DocumentChanges {
        title: request.title.map(|t| t.trim().to_string()),
        description: request.description.map(|d| d.trim().to_string()),
        category_id: request.category_id,
        tags: request.tags.map(TagInput::normalized),
    };

    let document = service.update(id, changes, auth.id()).await?;

    Ok(Json(DocumentMessageResponse {
        message: "Document updated successfully".to_string(),
        document,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document hidden; blobs are kept", body = MessageResponse),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_document(
    State(service): State<DocumentService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    service.soft_delete(id).await?;
    Ok(Json(MessageResponse::new("Document deleted successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/documents/{id}/permanent",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Record and blobs removed", body = MessageResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_document_permanently(
    State(service): State<DocumentService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    service.delete_permanently(id).await?;
    Ok(Json(MessageResponse::new(
        "Document permanently deleted successfully",
    )))
}

#[utoipa::path(
    get,
    path = "/api/documents/{id}/download",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document file", content_type = "application/octet-stream"),
        (status = 404, description = "Document not found or file missing in storage", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_document(
    State(service): State<DocumentService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let download = service.download(id).await?;
    tracing::debug!(document_id = %id, "Streaming document from storage");
    Ok(stream_response(download)?)
}

#[utoipa::path(
    get,
    path = "/api/documents/{id}/qr",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "QR code PNG", content_type = "image/png"),
        (status = 404, description = "Document not found or QR image missing in storage", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn download_qr_code(
    State(service): State<DocumentService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let download = service.download_qr(id).await?;
    Ok(stream_response(download)?)
}

#[utoipa::path(
    get,
    path = "/api/documents/{id}/link",
    tag = "documents",
    params(("id" = Uuid, Path, description = "Document ID"), LinkQuery),
    responses(
        (status = 200, description = "Direct link to the file", body = PresignedLinkResponse),
        (status = 400, description = "Expiry out of range", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn presigned_link(
    State(service): State<DocumentService>,
    Path(id): Path<Uuid>,
    Query(query): Query<LinkQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let expires_in = query.expires_in.unwrap_or(DEFAULT_LINK_EXPIRY_SECS);
    if !(MIN_LINK_EXPIRY_SECS..=MAX_LINK_EXPIRY_SECS).contains(&expires_in) {
        return Err(AppError::InvalidInput(format!(
            "expires_in must be between {} and {} seconds",
            MIN_LINK_EXPIRY_SECS, MAX_LINK_EXPIRY_SECS
        ))
        .into());
    }

    let url = service
        .presigned_link(id, Duration::from_secs(expires_in))
        .await?;

    Ok(Json(PresignedLinkResponse { url, expires_in }))
}

#[utoipa::path(
    get,
    path = "/api/documents/file/{container}/{key}",
    tag = "documents",
    params(
        ("container" = String, Path, description = "Storage container"),
        ("key" = String, Path, description = "Object key")
    ),
    responses(
        (status = 200, description = "Raw blob", content_type = "application/octet-stream"),
        (status = 404, description = "No such blob", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn serve_file(
    State(service): State<DocumentService>,
    Path((container, key)): Path<(String, String)>,
) -> Result<impl IntoResponse, HttpAppError> {
    let stream = service.open_blob(&container, &key).await?;

    let content_type = if container == service.containers().qr_codes {
        "image/png"
    } else {
        "application/octet-stream"
    };

    Ok(stream_response(BlobDownload {
        stream,
        file_name: key,
        content_type: content_type.to_string(),
        content_length: None,
    })?)
}

fn stream_response(download: BlobDownload) -> Result<Response<Body>, AppError> {
    let body_stream = download.stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, download.content_type.as_str())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&download.file_name),
        );
    if let Some(length) = download.content_length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    builder
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}

/// `attachment` with an ASCII fallback name plus the UTF-8 original.
fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if ascii == file_name {
        format!("attachment; filename=\"{}\"", file_name)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            ascii,
            utf8_percent_encode(file_name, NON_ALPHANUMERIC)
        )
    }
}
