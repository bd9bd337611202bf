//! Database setup and schema repair

use anyhow::{Context, Result};
use docqr_core::Config;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Connect the pool, then bring the schema up to date.
///
/// Repair failures are logged per statement and never abort startup; a table that still
/// cannot be used surfaces as request errors instead.
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(config.database_url())
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database connected successfully"
    );

    let report = docqr_db::repair_schema(&pool).await;
    tracing::info!(
        applied = report.applied,
        failed = report.failed,
        "Database schema checked"
    );

    Ok(pool)
}
