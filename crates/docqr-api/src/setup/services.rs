//! Service and repository initialization

use crate::auth::jwt::JwtService;
use crate::services::audit::{AuditQueue, AuditWorker};
use crate::services::documents::{Containers, DocumentService};
use crate::services::qr_codec::{QrCodec, QrCodecConfig};
use crate::state::{AppState, AuthState, DbState, UploadLimits};
use anyhow::Result;
use docqr_core::Config;
use docqr_db::{
    AuditLogRepository, CategoryRepository, DocumentRepository, StatsRepository, UserRepository,
};
use docqr_storage::Storage;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Wire repositories and services into the shared state and start the audit worker.
///
/// The worker exits once the returned state (and every queue clone in the router) is
/// dropped.
pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
) -> Result<(Arc<AppState>, JoinHandle<()>)> {
    let users = UserRepository::new(pool.clone());
    let categories = CategoryRepository::new(pool.clone());
    let audit_logs = AuditLogRepository::new(pool.clone());

    let codec = QrCodec::new(QrCodecConfig {
        app_base_url: config.app_base_url().to_string(),
        size_px: config.qr_code_size(),
        error_correction: config.qr_error_correction(),
    })?;

    let documents = DocumentService::new(
        pool.clone(),
        DocumentRepository::new(pool.clone()),
        categories.clone(),
        storage.clone(),
        codec,
        Containers {
            documents: config.documents_bucket().to_string(),
            qr_codes: config.qr_codes_bucket().to_string(),
        },
    );

    let (audit, receiver) = AuditQueue::bounded(config.audit_queue_capacity());
    let audit_worker = AuditWorker::new(receiver, audit_logs.clone()).spawn();

    let state = AppState {
        db: DbState {
            pool: pool.clone(),
            users: users.clone(),
            categories,
            audit_logs,
            statistics: StatsRepository::new(pool),
        },
        auth: AuthState {
            jwt: JwtService::new(config.jwt_secret(), config.jwt_expiry_hours()),
            users,
        },
        documents,
        storage,
        audit,
        uploads: UploadLimits {
            max_file_size: config.max_file_size_bytes(),
            allowed_extensions: config.allowed_file_types().to_vec(),
        },
    };

    tracing::info!(
        max_file_size = config.max_file_size_bytes(),
        audit_queue_capacity = config.audit_queue_capacity(),
        "Services initialized"
    );

    Ok((Arc::new(state), audit_worker))
}
