//! User repository. Password hashes stay inside this module except for
//! [`UserCredentials`], which the login path needs.

use chrono::{DateTime, Utc};
use docqr_core::models::{NewUser, User, UserChanges, UserCredentials, UserRole, Page};
use docqr_core::AppError;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, is_active, created_at, updated_at";

/// Row type for the users table (role is stored as text).
#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn to_user(&self) -> Result<User, AppError> {
        let role: UserRole = self.role.parse().map_err(|_| {
            AppError::Internal(format!("User {} has unknown role '{}'", self.id, self.role))
        })?;

        Ok(User {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    pub fn into_credentials(self) -> Result<UserCredentials, AppError> {
        let user = self.to_user()?;
        Ok(UserCredentials {
            user,
            password_hash: self.password_hash,
        })
    }
}

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, new_user), fields(db.table = "users", db.operation = "insert", username = %new_user.username))]
    pub async fn create(&self, new_user: &NewUser) -> Result<User, AppError> {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash, role, is_active)
            VALUES ($1, $2, $3, $4, true)
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = sqlx::query_as::<Postgres, UserRow>(&sql)
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(new_user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::from_unique_violation(e, "Username or email already exists"))?;

        row.to_user()
    }

    /// Look up an account by username or email, with its password hash.
    #[tracing::instrument(skip(self, login), fields(db.table = "users", db.operation = "select"))]
    pub async fn find_by_login(&self, login: &str) -> Result<Option<UserCredentials>, AppError> {
        let sql = format!(
            "SELECT {} FROM users WHERE username = $1 OR email = $1 ORDER BY username = $1 DESC LIMIT 1",
            USER_COLUMNS
        );

        let row = sqlx::query_as::<Postgres, UserRow>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRow::into_credentials).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        let row = sqlx::query_as::<Postgres, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(UserRow::to_user).transpose()
    }

    /// Newest accounts first, with the total account count.
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select_list"))]
    pub async fn list(&self, page: i64, limit: i64) -> Result<(Vec<User>, i64), AppError> {
        let offset = Page::<()>::offset(page, limit);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM users ORDER BY created_at DESC, id LIMIT $1 OFFSET $2",
            USER_COLUMNS
        );
        let rows = sqlx::query_as::<Postgres, UserRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let users = rows
            .iter()
            .map(UserRow::to_user)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((users, total))
    }

    #[tracing::instrument(skip(self, changes), fields(db.table = "users", db.operation = "update", db.record_id = %id))]
    pub async fn update(&self, id: Uuid, changes: &UserChanges) -> Result<Option<User>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");

        if let Some(username) = &changes.username {
            qb.push(", username = ").push_bind(username.clone());
        }
        if let Some(email) = &changes.email {
            qb.push(", email = ").push_bind(email.clone());
        }
        if let Some(password_hash) = &changes.password_hash {
            qb.push(", password_hash = ").push_bind(password_hash.clone());
        }
        if let Some(role) = changes.role {
            qb.push(", role = ").push_bind(role.as_str());
        }
        if let Some(is_active) = changes.is_active {
            qb.push(", is_active = ").push_bind(is_active);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING {}", USER_COLUMNS));

        let row = qb
            .build_query_as::<UserRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::from_unique_violation(e, "Username or email already exists"))?;

        row.as_ref().map(UserRow::to_user).transpose()
    }

    /// Soft-disable an account. False when it does not exist.
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "deactivate", db.record_id = %id))]
    pub async fn deactivate(&self, id: Uuid) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE users SET is_active = false, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "exists"))]
    pub async fn username_or_email_taken(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, AppError> {
        let taken = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    /// Whether another account (not `exclude`) already uses `username`.
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "exists"))]
    pub async fn username_taken_by_other(
        &self,
        username: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let taken = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(username)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    /// Whether another account (not `exclude`) already uses `email`.
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "exists"))]
    pub async fn email_taken_by_other(
        &self,
        email: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let taken = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    /// Create the admin account or reset an existing one with the same username.
    #[tracing::instrument(skip(self, tx, password_hash), fields(db.table = "users", db.operation = "upsert"))]
    pub async fn upsert_admin_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, AppError> {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, password_hash, role, is_active)
            VALUES ($1, $2, $3, 'admin', true)
            ON CONFLICT (username) DO UPDATE
            SET email = EXCLUDED.email,
                password_hash = EXCLUDED.password_hash,
                role = 'admin',
                is_active = true,
                updated_at = NOW()
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = sqlx::query_as::<Postgres, UserRow>(&sql)
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&mut **tx)
            .await?;

        row.to_user()
    }
}
