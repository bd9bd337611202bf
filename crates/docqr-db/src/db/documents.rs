//! Document repository: documents, their tags, and the joined listing view.

use docqr_core::models::{
    normalize_tags, Document, DocumentChanges, DocumentFilter, DocumentView, NewDocument, Page,
    StorageLocation, MAX_PAGE_LIMIT,
};
use docqr_core::AppError;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

const DOCUMENT_COLUMNS: &str = "id, title, description, category_id, file_name, file_size, \
    mime_type, storage_bucket, storage_object_key, qr_code_path, qr_code_data, created_at, \
    created_by, updated_at, updated_by, deleted_at";

/// Joined view: category name, creator/updater usernames and sorted distinct tags.
/// Callers append a WHERE clause starting with `d.deleted_at IS NULL`, then
/// [`VIEW_GROUP_BY`].
const VIEW_SELECT: &str = r#"
    SELECT
        d.id, d.title, d.description, d.category_id, c.name AS category_name,
        d.file_name, d.file_size, d.mime_type, d.storage_bucket, d.storage_object_key,
        d.qr_code_path, d.qr_code_data,
        d.created_at, d.created_by, cu.username AS created_by_username,
        d.updated_at, d.updated_by, uu.username AS updated_by_username,
        COALESCE(
            array_agg(DISTINCT dt.tag::text ORDER BY dt.tag::text) FILTER (WHERE dt.tag IS NOT NULL),
            '{}'::text[]
        ) AS tags
    FROM documents d
    LEFT JOIN document_categories c ON c.id = d.category_id
    LEFT JOIN users cu ON cu.id = d.created_by
    LEFT JOIN users uu ON uu.id = d.updated_by
    LEFT JOIN document_tags dt ON dt.document_id = d.id
"#;

const VIEW_GROUP_BY: &str = " GROUP BY d.id, c.name, cu.username, uu.username";

/// Escape `%`, `_` and the escape character itself for a LIKE pattern.
pub(crate) fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Append the listing filters. Always starts with the soft-delete guard.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &DocumentFilter) {
    qb.push(" WHERE d.deleted_at IS NULL");

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (d.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR d.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(category_id) = filter.category_id {
        qb.push(" AND d.category_id = ").push_bind(category_id);
    }

    if let Some(created_by) = filter.created_by {
        qb.push(" AND d.created_by = ").push_bind(created_by);
    }

    if let Some(date_from) = filter.date_from {
        qb.push(" AND d.created_at >= ").push_bind(date_from);
    }

    if let Some(date_to) = filter.date_to {
        qb.push(" AND d.created_at <= ").push_bind(date_to);
    }

    let tags = normalize_tags(&filter.tags);
    if !tags.is_empty() {
        qb.push(" AND d.id IN (SELECT document_id FROM document_tags WHERE tag = ANY(")
            .push_bind(tags)
            .push("))");
    }
}

/// Repository for the `documents` and `document_tags` tables
#[derive(Clone)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new document row within a transaction.
    #[tracing::instrument(skip(self, tx, doc), fields(db.table = "documents", db.operation = "insert", db.record_id = %doc.id))]
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        doc: &NewDocument,
    ) -> Result<Document, AppError> {
        let sql = format!(
            r#"
            INSERT INTO documents (
                id, title, description, category_id, file_name, file_size, mime_type,
                storage_bucket, storage_object_key, qr_code_path, qr_code_data,
                created_by, updated_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        );

        let document = sqlx::query_as::<Postgres, Document>(&sql)
            .bind(doc.id)
            .bind(&doc.title)
            .bind(&doc.description)
            .bind(doc.category_id)
            .bind(&doc.file_name)
            .bind(doc.file_size)
            .bind(&doc.mime_type)
            .bind(&doc.storage_bucket)
            .bind(&doc.storage_object_key)
            .bind(&doc.qr_code_path)
            .bind(&doc.qr_code_data)
            .bind(doc.created_by)
            .fetch_one(&mut **tx)
            .await?;

        Ok(document)
    }

    /// Attach tags to a document. Tags are normalized; duplicates are ignored.
    #[tracing::instrument(skip(self, tx), fields(db.table = "document_tags", db.operation = "insert", db.record_id = %document_id))]
    pub async fn insert_tags_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        tags: &[String],
    ) -> Result<(), AppError> {
        let tags = normalize_tags(tags);
        if tags.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO document_tags (document_id, tag)
            SELECT $1, UNNEST($2::text[])
            ON CONFLICT (document_id, tag) DO NOTHING
            "#,
        )
        .bind(document_id)
        .bind(&tags)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Replace the full tag set of a document.
    #[tracing::instrument(skip(self, tx), fields(db.table = "document_tags", db.operation = "replace", db.record_id = %document_id))]
    pub async fn replace_tags_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        document_id: Uuid,
        tags: &[String],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM document_tags WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut **tx)
            .await?;

        self.insert_tags_tx(tx, document_id, tags).await
    }

    /// Active document with joins, or `None` if absent or soft-deleted.
    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select", db.record_id = %id))]
    pub async fn get_view(&self, id: Uuid) -> Result<Option<DocumentView>, AppError> {
        let sql = format!(
            "{} WHERE d.deleted_at IS NULL AND d.id = $1 {}",
            VIEW_SELECT, VIEW_GROUP_BY
        );

        let view = sqlx::query_as::<Postgres, DocumentView>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(view)
    }

    /// Same as [`Self::get_view`] but sees uncommitted rows of `tx`.
    #[tracing::instrument(skip(self, tx), fields(db.table = "documents", db.operation = "select", db.record_id = %id))]
    pub async fn get_view_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<DocumentView>, AppError> {
        let sql = format!(
            "{} WHERE d.deleted_at IS NULL AND d.id = $1 {}",
            VIEW_SELECT, VIEW_GROUP_BY
        );

        let view = sqlx::query_as::<Postgres, DocumentView>(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(view)
    }

    /// Blob locations for a document, including soft-deleted ones.
    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select", db.record_id = %id))]
    pub async fn get_storage_location(
        &self,
        id: Uuid,
    ) -> Result<Option<StorageLocation>, AppError> {
        let location = sqlx::query_as::<Postgres, StorageLocation>(
            "SELECT id, storage_bucket, storage_object_key, qr_code_path FROM documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(location)
    }

    /// Filtered, sorted, paginated listing of active documents.
    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "select_list"))]
    pub async fn list(&self, filter: &DocumentFilter) -> Result<Page<DocumentView>, AppError> {
        let page = filter.page.max(1);
        let limit = filter.limit.clamp(1, MAX_PAGE_LIMIT);
        let offset = Page::<DocumentView>::offset(page, limit);

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents d");
        push_filters(&mut count_qb, filter);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(VIEW_SELECT);
        push_filters(&mut qb, filter);
        qb.push(VIEW_GROUP_BY);

        // Column and direction come from allow-listed enums, never from raw input.
        let direction = filter.sort_order.keyword();
        qb.push(format!(
            " ORDER BY d.{} {}, d.id {}",
            filter.sort_by.column(),
            direction,
            direction
        ));
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);

        let items = qb
            .build_query_as::<DocumentView>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items,
            total,
            page,
            limit,
        })
    }

    /// Apply metadata changes. Returns false when the document is absent or deleted.
    ///
    /// `updated_by`/`updated_at` are bumped even when only tags change.
    #[tracing::instrument(skip(self, tx, changes), fields(db.table = "documents", db.operation = "update", db.record_id = %id))]
    pub async fn update_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        changes: &DocumentChanges,
        updated_by: Uuid,
    ) -> Result<bool, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE documents SET updated_at = NOW(), updated_by = ");
        qb.push_bind(updated_by);

        if let Some(title) = &changes.title {
            qb.push(", title = ").push_bind(title.clone());
        }
        if let Some(description) = &changes.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(category_id) = changes.category_id {
            qb.push(", category_id = ").push_bind(category_id);
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND deleted_at IS NULL");

        let result = qb.build().execute(&mut **tx).await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        if let Some(tags) = &changes.tags {
            self.replace_tags_tx(tx, id, tags).await?;
        }

        Ok(true)
    }

    /// Mark a document deleted. False when absent or already deleted.
    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "soft_delete", db.record_id = %id))]
    pub async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE documents SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove the row for good; tags go with it through the cascade.
    #[tracing::instrument(skip(self), fields(db.table = "documents", db.operation = "delete", db.record_id = %id))]
    pub async fn delete_permanently(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqr_core::models::{SortField, SortOrder};

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn filters_always_exclude_deleted_rows() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents d");
        push_filters(&mut qb, &DocumentFilter::default());
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM documents d WHERE d.deleted_at IS NULL"
        );
    }

    #[test]
    fn filters_bind_every_value() {
        let filter = DocumentFilter {
            search: Some("report".to_string()),
            category_id: Some(Uuid::new_v4()),
            tags: vec![" Finance ".to_string()],
            sort_by: SortField::Title,
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM documents d");
        push_filters(&mut qb, &filter);
        let sql = qb.sql();

        assert!(sql.contains("d.title ILIKE $1 OR d.description ILIKE $2"));
        assert!(sql.contains("d.category_id = $3"));
        assert!(sql.contains("tag = ANY($4)"));
        assert!(!sql.contains("report"));
    }
}
