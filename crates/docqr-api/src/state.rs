//! Application state and sub-state extractors.
//!
//! AppState is split into sub-states so handlers can extract only what they need via
//! Axum's `FromRef`.

use crate::auth::jwt::JwtService;
use crate::services::audit::AuditQueue;
use crate::services::documents::DocumentService;
use docqr_db::{AuditLogRepository, CategoryRepository, StatsRepository, UserRepository};
use docqr_storage::Storage;
use sqlx::PgPool;
use std::sync::Arc;

/// Pool and the repositories handlers call directly. Documents go through
/// [`DocumentService`] instead.
#[derive(Clone)]
pub struct DbState {
    pub pool: PgPool,
    pub users: UserRepository,
    pub categories: CategoryRepository,
    pub audit_logs: AuditLogRepository,
    pub statistics: StatsRepository,
}

/// Limits the upload handler checks before anything is stored.
#[derive(Clone, Debug)]
pub struct UploadLimits {
    pub max_file_size: usize,
    pub allowed_extensions: Vec<String>,
}

#[derive(Clone)]
pub struct AuthState {
    pub jwt: JwtService,
    pub users: UserRepository,
}

#[derive(Clone)]
pub struct AppState {
    pub db: DbState,
    pub auth: AuthState,
    pub documents: DocumentService,
    pub storage: Arc<dyn Storage>,
    pub audit: AuditQueue,
    pub uploads: UploadLimits,
}

impl axum::extract::FromRef<Arc<AppState>> for DbState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.db.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for AuthState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.auth.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for DocumentService {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.documents.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for UploadLimits {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.uploads.clone()
    }
}
