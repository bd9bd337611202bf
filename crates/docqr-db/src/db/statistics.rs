use docqr_core::models::{CategoryCount, DailyCount, Statistics};
use docqr_core::AppError;
use sqlx::{PgPool, Postgres};

/// Read-only aggregates for the admin dashboard.
#[derive(Clone)]
pub struct StatsRepository {
    pool: PgPool,
}

impl StatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.operation = "aggregate"))]
    pub async fn statistics(&self) -> Result<Statistics, AppError> {
        let total_users = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM users WHERE is_active = true",
        )
        .fetch_one(&self.pool);

        let total_documents = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM documents WHERE deleted_at IS NULL",
        )
        .fetch_one(&self.pool);

        let total_categories =
            sqlx::query_scalar::<Postgres, i64>("SELECT COUNT(*) FROM document_categories")
                .fetch_one(&self.pool);

        let total_storage_bytes = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COALESCE(SUM(file_size), 0)::BIGINT FROM documents WHERE deleted_at IS NULL",
        )
        .fetch_one(&self.pool);

        let documents_per_day = sqlx::query_as::<Postgres, DailyCount>(
            r#"
            SELECT DATE(created_at) AS date, COUNT(*) AS count
            FROM documents
            WHERE created_at >= CURRENT_DATE - INTERVAL '30 days' AND deleted_at IS NULL
            GROUP BY DATE(created_at)
            ORDER BY date DESC
            "#,
        )
        .fetch_all(&self.pool);

        let documents_by_category = sqlx::query_as::<Postgres, CategoryCount>(
            r#"
            SELECT dc.name, COUNT(d.id) AS count
            FROM document_categories dc
            LEFT JOIN documents d ON d.category_id = dc.id AND d.deleted_at IS NULL
            GROUP BY dc.id, dc.name
            ORDER BY count DESC, dc.name
            LIMIT 10
            "#,
        )
        .fetch_all(&self.pool);

        let (
            total_users,
            total_documents,
            total_categories,
            total_storage_bytes,
            documents_per_day,
            documents_by_category,
        ) = tokio::try_join!(
            total_users,
            total_documents,
            total_categories,
            total_storage_bytes,
            documents_per_day,
            documents_by_category
        )?;

        Ok(Statistics {
            total_users,
            total_documents,
            total_categories,
            total_storage_bytes,
            documents_per_day,
            documents_by_category,
        })
    }
}
