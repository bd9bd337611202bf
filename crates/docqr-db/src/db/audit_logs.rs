use docqr_core::models::{AuditLogFilter, AuditLogView, NewAuditLog, Page, MAX_PAGE_LIMIT};
use docqr_core::AppError;
use sqlx::{PgPool, Postgres, QueryBuilder};

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &AuditLogFilter) {
    qb.push(" WHERE 1=1");

    if let Some(user_id) = filter.user_id {
        qb.push(" AND al.user_id = ").push_bind(user_id);
    }
    if let Some(action) = &filter.action {
        qb.push(" AND al.action = ").push_bind(action.clone());
    }
    if let Some(resource_type) = &filter.resource_type {
        qb.push(" AND al.resource_type = ").push_bind(resource_type.clone());
    }
    if let Some(date_from) = filter.date_from {
        qb.push(" AND al.created_at >= ").push_bind(date_from);
    }
    if let Some(date_to) = filter.date_to {
        qb.push(" AND al.created_at <= ").push_bind(date_to);
    }
}

/// Append-only audit trail
#[derive(Clone)]
pub struct AuditLogRepository {
    pool: PgPool,
}

impl AuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, entry), fields(db.table = "audit_logs", db.operation = "insert", action = %entry.action))]
    pub async fn insert(&self, entry: &NewAuditLog) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action, resource_type, resource_id, details, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(entry.resource_id)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest entries first, with the size of the filtered set.
    #[tracing::instrument(skip(self), fields(db.table = "audit_logs", db.operation = "select_list"))]
    pub async fn list(&self, filter: &AuditLogFilter) -> Result<(Vec<AuditLogView>, i64), AppError> {
        let page = filter.page.max(1);
        let limit = filter.limit.clamp(1, MAX_PAGE_LIMIT);
        let offset = Page::<()>::offset(page, limit);

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_logs al");
        push_filters(&mut count_qb, filter);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(
            r#"
            SELECT al.id, al.user_id, u.username, al.action, al.resource_type, al.resource_id,
                   al.details, al.ip_address, al.user_agent, al.created_at
            FROM audit_logs al
            LEFT JOIN users u ON u.id = al.user_id
            "#,
        );
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY al.created_at DESC, al.id");
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);

        let logs = qb
            .build_query_as::<AuditLogView>()
            .fetch_all(&self.pool)
            .await?;

        Ok((logs, total))
    }
}
