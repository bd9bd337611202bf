use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Document row as stored in `documents`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_bucket: String,
    pub storage_object_key: String,
    pub qr_code_path: Option<String>,
    pub qr_code_data: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Document joined with its category name, creator/updater usernames and tags.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DocumentView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_bucket: String,
    pub storage_object_key: String,
    pub qr_code_path: Option<String>,
    pub qr_code_data: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub created_by_username: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
    pub updated_by_username: Option<String>,
    pub tags: Vec<String>,
}

/// Values for a new document row. Storage linkage is filled in by the lifecycle
/// service after both blobs were written.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_bucket: String,
    pub storage_object_key: String,
    pub qr_code_path: String,
    pub qr_code_data: String,
    pub created_by: Uuid,
}

/// Metadata changes for an existing document. `None` leaves the field untouched.
///
/// `category_id: Some(None)` clears the category.
#[derive(Debug, Clone, Default)]
pub struct DocumentChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Option<Uuid>>,
    pub tags: Option<Vec<String>>,
}

/// Column limits for document text fields, in characters.
pub const MAX_TITLE_LENGTH: usize = 255;
pub const MAX_TAG_LENGTH: usize = 50;
pub const MAX_MIME_TYPE_LENGTH: usize = 100;

/// Where a document's blobs live. Also returned for soft-deleted rows.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StorageLocation {
    pub id: Uuid,
    pub storage_bucket: String,
    pub storage_object_key: String,
    pub qr_code_path: Option<String>,
}

/// Columns a document listing may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    FileSize,
}

impl SortField {
    /// Column name; only ever one of the allow-listed identifiers.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::Title => "title",
            SortField::FileSize => "file_size",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            "title" => Ok(SortField::Title),
            "file_size" => Ok(SortField::FileSize),
            _ => Err("Invalid sort field".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASC" | "asc" => Ok(SortOrder::Asc),
            "DESC" | "desc" => Ok(SortOrder::Desc),
            _ => Err("Sort order must be ASC or DESC".to_string()),
        }
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.keyword())
    }
}

/// Filters for listing active documents.
#[derive(Debug, Clone)]
pub struct DocumentFilter {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub created_by: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub page: i64,
    pub limit: i64,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for DocumentFilter {
    fn default() -> Self {
        Self {
            search: None,
            category_id: None,
            tags: Vec::new(),
            created_by: None,
            date_from: None,
            date_to: None,
            page: 1,
            limit: super::DEFAULT_PAGE_LIMIT,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}
