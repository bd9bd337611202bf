//! Database repositories for data access layer
//!
//! One repository per table group: documents (with tags), categories, users,
//! audit logs and the statistics aggregates. `schema` repairs the tables at startup.

pub mod audit_logs;
pub mod categories;
pub mod documents;
pub mod schema;
pub mod statistics;
pub mod transaction;
pub mod users;

pub use audit_logs::AuditLogRepository;
pub use categories::CategoryRepository;
pub use documents::DocumentRepository;
pub use statistics::StatsRepository;
pub use transaction::{with_transaction, TransactionGuard};
pub use users::{UserRepository, UserRow};
