use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CategoryCount {
    pub name: String,
    pub count: i64,
}

/// System-wide counters for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_users: i64,
    pub total_documents: i64,
    pub total_categories: i64,
    pub total_storage_bytes: i64,
    /// Active documents created per day over the last 30 days, newest first.
    pub documents_per_day: Vec<DailyCount>,
    /// Top ten categories by active document count.
    pub documents_by_category: Vec<CategoryCount>,
}
