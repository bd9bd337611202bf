//! Seed an admin account and the default document categories.
//!
//! Safe to re-run: the admin is reset to the given credentials and existing
//! categories are left alone.
//!
//! Environment: `SEED_ADMIN_USERNAME` (default `admin`), `SEED_ADMIN_EMAIL`
//! (default `admin@docqr.local`) and `SEED_ADMIN_PASSWORD` (required).

use anyhow::Context;
use docqr_api::auth::password::hash_password;
use docqr_core::Config;
use docqr_db::{with_transaction, CategoryRepository, UserRepository};

const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Legal", "Legal documents and contracts"),
    ("Financial", "Financial reports and statements"),
    ("HR", "Human resources documents"),
    ("Technical", "Technical specifications and manuals"),
    ("Marketing", "Marketing materials and assets"),
];

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    docqr_api::telemetry::init_telemetry(config.log_format());

    let username = std::env::var("SEED_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let email = std::env::var("SEED_ADMIN_EMAIL")
        .unwrap_or_else(|_| "admin@docqr.local".to_string())
        .to_lowercase();
    let password =
        std::env::var("SEED_ADMIN_PASSWORD").context("SEED_ADMIN_PASSWORD must be set")?;
    if password.len() < 6 {
        anyhow::bail!("SEED_ADMIN_PASSWORD must be at least 6 characters");
    }

    let pool = docqr_api::setup::database::setup_database(&config).await?;
    let password_hash = hash_password(&password).await?;

    let users = UserRepository::new(pool.clone());
    let categories = CategoryRepository::new(pool.clone());

    let (admin, created) = with_transaction(&pool, |tx| {
        Box::pin(async move {
            let admin = users
                .upsert_admin_tx(tx, &username, &email, &password_hash)
                .await?;
            let mut created = 0usize;
            for (name, description) in DEFAULT_CATEGORIES {
                if categories.ensure_tx(tx, name, description).await? {
                    created += 1;
                }
            }
            Ok((admin, created))
        })
    })
    .await?;

    tracing::info!(
        admin_id = %admin.id,
        username = %admin.username,
        categories_created = created,
        "Seeding completed"
    );

    Ok(())
}
