//! Startup schema check and repair.
//!
//! Every statement is idempotent. A failing statement is logged and skipped so a
//! partially broken database still lets the service start; requests touching the
//! broken parts will fail with database errors instead.

use sqlx::PgPool;

const CREATE_TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            username VARCHAR(50) UNIQUE NOT NULL,
            email VARCHAR(255) UNIQUE NOT NULL,
            password_hash VARCHAR(255) NOT NULL,
            role VARCHAR(20) NOT NULL DEFAULT 'user',
            is_active BOOLEAN NOT NULL DEFAULT true,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "document_categories",
        r#"
        CREATE TABLE IF NOT EXISTS document_categories (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name VARCHAR(100) UNIQUE NOT NULL,
            description TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            created_by UUID REFERENCES users(id) ON DELETE SET NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_by UUID REFERENCES users(id) ON DELETE SET NULL
        )
        "#,
    ),
    (
        "documents",
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            title VARCHAR(255) NOT NULL,
            description TEXT,
            category_id UUID REFERENCES document_categories(id) ON DELETE SET NULL,
            file_name VARCHAR(255) NOT NULL,
            file_size BIGINT NOT NULL,
            mime_type VARCHAR(100) NOT NULL,
            storage_bucket VARCHAR(100) NOT NULL,
            storage_object_key VARCHAR(255) NOT NULL,
            qr_code_path VARCHAR(255),
            qr_code_data TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            created_by UUID REFERENCES users(id) ON DELETE SET NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_by UUID REFERENCES users(id) ON DELETE SET NULL,
            deleted_at TIMESTAMPTZ
        )
        "#,
    ),
    (
        "document_tags",
        r#"
        CREATE TABLE IF NOT EXISTS document_tags (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            document_id UUID NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            tag VARCHAR(50) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (document_id, tag)
        )
        "#,
    ),
    (
        "audit_logs",
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_id UUID REFERENCES users(id) ON DELETE SET NULL,
            action VARCHAR(50) NOT NULL,
            resource_type VARCHAR(50) NOT NULL,
            resource_id UUID,
            details JSONB,
            ip_address VARCHAR(45),
            user_agent TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
];

/// Columns added after the first schema revision, with defaults safe for old rows.
const ADD_COLUMNS: &[&str] = &[
    "ALTER TABLE documents ADD COLUMN IF NOT EXISTS storage_bucket VARCHAR(100) NOT NULL DEFAULT 'documents'",
    "ALTER TABLE documents ADD COLUMN IF NOT EXISTS storage_object_key VARCHAR(255) NOT NULL DEFAULT 'unknown'",
    "ALTER TABLE documents ADD COLUMN IF NOT EXISTS qr_code_path VARCHAR(255)",
    "ALTER TABLE documents ADD COLUMN IF NOT EXISTS qr_code_data TEXT NOT NULL DEFAULT ''",
    "ALTER TABLE documents ADD COLUMN IF NOT EXISTS file_size BIGINT NOT NULL DEFAULT 0",
    "ALTER TABLE documents ADD COLUMN IF NOT EXISTS mime_type VARCHAR(100) NOT NULL DEFAULT 'application/octet-stream'",
    "ALTER TABLE documents ADD COLUMN IF NOT EXISTS file_name VARCHAR(255) NOT NULL DEFAULT 'untitled'",
    "ALTER TABLE documents ADD COLUMN IF NOT EXISTS deleted_at TIMESTAMPTZ",
    "ALTER TABLE users ADD COLUMN IF NOT EXISTS is_active BOOLEAN NOT NULL DEFAULT true",
    "ALTER TABLE users ADD COLUMN IF NOT EXISTS role VARCHAR(20) NOT NULL DEFAULT 'user'",
    "ALTER TABLE audit_logs ADD COLUMN IF NOT EXISTS details JSONB",
];

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_documents_category ON documents(category_id)",
    "CREATE INDEX IF NOT EXISTS idx_documents_created_by ON documents(created_by)",
    "CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_documents_active ON documents(id) WHERE deleted_at IS NULL",
    "CREATE INDEX IF NOT EXISTS idx_document_tags_tag ON document_tags(tag)",
    "CREATE INDEX IF NOT EXISTS idx_audit_logs_user ON audit_logs(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_audit_logs_created_at ON audit_logs(created_at DESC)",
];

/// Outcome of a repair pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepairReport {
    pub applied: usize,
    pub failed: usize,
}

/// Bring the schema up to date. Never fails; see [`RepairReport`] for the outcome.
pub async fn repair(pool: &PgPool) -> RepairReport {
    tracing::info!("Checking database schema health");

    let mut report = RepairReport::default();

    let statements = CREATE_TABLES
        .iter()
        .map(|(table, sql)| (*table, *sql))
        .chain(ADD_COLUMNS.iter().map(|sql| ("alter", *sql)))
        .chain(CREATE_INDEXES.iter().map(|sql| ("index", *sql)));

    for (label, sql) in statements {
        match sqlx::query(sql).execute(pool).await {
            Ok(_) => report.applied += 1,
            Err(e) => {
                report.failed += 1;
                tracing::error!(
                    error = %e,
                    step = label,
                    statement = sql.trim(),
                    "Schema repair statement failed"
                );
            }
        }
    }

    if report.failed == 0 {
        tracing::info!(statements = report.applied, "Schema check/repair completed");
    } else {
        tracing::warn!(
            applied = report.applied,
            failed = report.failed,
            "Schema repair finished with failures; expect database errors on affected routes"
        );
    }

    report
}
