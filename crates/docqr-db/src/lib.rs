//! DOCQR database layer: repositories over PostgreSQL via sqlx.

pub mod db;

pub use db::schema::{repair as repair_schema, RepairReport};
pub use db::{
    with_transaction, AuditLogRepository, CategoryRepository, DocumentRepository,
    StatsRepository, TransactionGuard, UserRepository,
};
