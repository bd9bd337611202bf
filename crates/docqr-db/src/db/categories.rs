use docqr_core::models::{Category, CategoryChanges, CategoryView};
use docqr_core::AppError;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

const VIEW_SELECT: &str = r#"
    SELECT
        dc.id, dc.name, dc.description,
        dc.created_at, dc.created_by, u1.username AS created_by_username,
        dc.updated_at, dc.updated_by, u2.username AS updated_by_username,
        COUNT(d.id) AS document_count
    FROM document_categories dc
    LEFT JOIN users u1 ON u1.id = dc.created_by
    LEFT JOIN users u2 ON u2.id = dc.updated_by
    LEFT JOIN documents d ON d.category_id = dc.id AND d.deleted_at IS NULL
"#;

const VIEW_GROUP_BY: &str = " GROUP BY dc.id, u1.username, u2.username";

/// Repository for document categories
#[derive(Clone)]
pub struct CategoryRepository {
    pool: PgPool,
}

impl CategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a category. A duplicate name, including one that wins a concurrent
    /// insert race, is a conflict.
    #[tracing::instrument(skip(self), fields(db.table = "document_categories", db.operation = "insert"))]
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        created_by: Uuid,
    ) -> Result<Category, AppError> {
        let existing = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM document_categories WHERE name = $1)",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        if existing {
            return Err(AppError::Conflict("Category already exists".to_string()));
        }

        sqlx::query_as::<Postgres, Category>(
            r#"
            INSERT INTO document_categories (name, description, created_by, updated_by)
            VALUES ($1, $2, $3, $3)
            RETURNING id, name, description, created_at, created_by, updated_at, updated_by
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "Category already exists"))
    }

    /// All categories ordered by name, with active document counts.
    #[tracing::instrument(skip(self), fields(db.table = "document_categories", db.operation = "select_list"))]
    pub async fn list(&self) -> Result<Vec<CategoryView>, AppError> {
        let sql = format!("{}{} ORDER BY dc.name ASC", VIEW_SELECT, VIEW_GROUP_BY);
        let categories = sqlx::query_as::<Postgres, CategoryView>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(categories)
    }

    #[tracing::instrument(skip(self), fields(db.table = "document_categories", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<CategoryView>, AppError> {
        let sql = format!("{} WHERE dc.id = $1{}", VIEW_SELECT, VIEW_GROUP_BY);
        let category = sqlx::query_as::<Postgres, CategoryView>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    #[tracing::instrument(skip(self), fields(db.table = "document_categories", db.operation = "exists", db.record_id = %id))]
    pub async fn exists(&self, id: Uuid) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM document_categories WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Update name and/or description. `None` when the category does not exist.
    #[tracing::instrument(skip(self, changes), fields(db.table = "document_categories", db.operation = "update", db.record_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        changes: &CategoryChanges,
        updated_by: Uuid,
    ) -> Result<Option<CategoryView>, AppError> {
        if let Some(name) = &changes.name {
            let taken = sqlx::query_scalar::<Postgres, bool>(
                "SELECT EXISTS(SELECT 1 FROM document_categories WHERE name = $1 AND id <> $2)",
            )
            .bind(name)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

            if taken {
                return Err(AppError::Conflict(
                    "Category name already exists".to_string(),
                ));
            }
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "UPDATE document_categories SET updated_at = NOW(), updated_by = ",
        );
        qb.push_bind(updated_by);

        if let Some(name) = &changes.name {
            qb.push(", name = ").push_bind(name.clone());
        }
        if let Some(description) = &changes.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::from_unique_violation(e, "Category name already exists"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get(id).await
    }

    /// Delete a category that no active document references.
    ///
    /// Returns false when the category does not exist.
    #[tracing::instrument(skip(self), fields(db.table = "document_categories", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let in_use: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM documents WHERE category_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if in_use > 0 {
            return Err(AppError::HasDependents(
                "Cannot delete category with associated documents".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM document_categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert a category unless the name is taken. Used by the seed binary.
    #[tracing::instrument(skip(self, tx), fields(db.table = "document_categories", db.operation = "upsert"))]
    pub async fn ensure_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
        description: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO document_categories (name, description)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(description)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
