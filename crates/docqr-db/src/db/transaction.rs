//! Database transaction utilities
//!
//! Multi-step writes (document insert + tags + read-back, metadata update + tag
//! replacement) run inside one of these so that a failure leaves no partial rows.

use docqr_core::AppError;
use sqlx::{PgPool, Postgres, Transaction};
use std::future::Future;
use std::pin::Pin;

/// A database transaction wrapper that tracks whether it was finished explicitly
///
/// # Example
///
/// ```ignore
/// use docqr_db::TransactionGuard;
///
/// async fn example(pool: &sqlx::PgPool) -> Result<(), docqr_core::AppError> {
///     let mut guard = TransactionGuard::begin(pool).await?;
///     sqlx::query("INSERT INTO ...").execute(&mut **guard.transaction()?).await?;
///     guard.commit().await?;
///     Ok(())
/// }
/// ```
pub struct TransactionGuard {
    transaction: Option<Transaction<'static, Postgres>>,
}

impl TransactionGuard {
    /// Begin a new database transaction
    pub async fn begin(pool: &PgPool) -> Result<Self, AppError> {
        let transaction = pool.begin().await?;
        Ok(Self {
            transaction: Some(transaction),
        })
    }

    /// The open transaction, for passing to repository `_tx` methods.
    pub fn transaction(&mut self) -> Result<&mut Transaction<'static, Postgres>, AppError> {
        self.transaction.as_mut().ok_or_else(|| {
            AppError::Internal("Transaction was already committed or rolled back".to_string())
        })
    }

    /// Commit the transaction
    pub async fn commit(mut self) -> Result<(), AppError> {
        if let Some(tx) = self.transaction.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    /// Rollback the transaction
    pub async fn rollback(mut self) -> Result<(), AppError> {
        if let Some(tx) = self.transaction.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        // sqlx queues a ROLLBACK when an open transaction is dropped; this only
        // flags the early return (usually a `?` on an error path).
        if self.transaction.is_some() {
            tracing::debug!("Transaction dropped without explicit commit or rollback - rolling back");
        }
    }
}

/// Execute a closure within a database transaction
///
/// Commits if the closure succeeds, otherwise rolls back and returns the closure's
/// error.
///
/// # Example
///
/// ```ignore
/// use docqr_db::with_transaction;
///
/// with_transaction(&pool, |tx| Box::pin(async move {
///     sqlx::query("INSERT INTO ...").execute(&mut **tx).await?;
///     Ok(())
/// })).await?;
/// ```
pub async fn with_transaction<F, R>(pool: &PgPool, f: F) -> Result<R, AppError>
where
    F: for<'c> FnOnce(
        &'c mut Transaction<'static, Postgres>,
    ) -> Pin<Box<dyn Future<Output = Result<R, AppError>> + Send + 'c>>,
{
    let mut tx = pool.begin().await?;

    match f(&mut tx).await {
        Ok(result) => {
            tx.commit().await?;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Transaction rollback failed");
            }
            Err(e)
        }
    }
}
