//! OpenAPI documentation.
//! Handler annotations use the default `/api` prefix; the served spec is rewritten to the
//! configured prefix at runtime.

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use docqr_core::models;

/// Prefix written in handler path annotations (utoipa requires compile-time literals).
const OPENAPI_PATH_PLACEHOLDER: &str = "/api";

/// Rewrite path keys from the placeholder prefix to `prefix`.
fn transform_openapi_paths(spec: &mut utoipa::openapi::OpenApi, prefix: &str) {
    if OPENAPI_PATH_PLACEHOLDER == prefix {
        return;
    }
    let path_map = std::mem::take(&mut spec.paths.paths);
    for (key, item) in path_map {
        let new_key = if key == OPENAPI_PATH_PLACEHOLDER
            || key.starts_with(&format!("{}/", OPENAPI_PATH_PLACEHOLDER))
        {
            key.replacen(OPENAPI_PATH_PLACEHOLDER, prefix, 1)
        } else {
            key
        };
        spec.paths.paths.insert(new_key, item);
    }
}

/// The OpenAPI spec with paths under the configured API prefix.
pub fn get_openapi_spec(api_prefix: &str) -> utoipa::openapi::OpenApi {
    let mut spec = ApiDoc::openapi();
    transform_openapi_paths(&mut spec, api_prefix);
    spec
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "DOCQR API",
        version = "1.0.0",
        description = "Document management with QR code binding: upload, tag, categorize, search, download and resolve documents by scanned QR codes."
    ),
    modifiers(&BearerAuth),
    paths(
        handlers::health::health_check,
        handlers::health::api_root,
        // Auth
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::me,
        handlers::auth::logout,
        // Documents
        handlers::documents::upload_document,
        handlers::documents::list_documents,
        handlers::documents::get_document,
        handlers::documents::get_document_by_qr,
        handlers::documents::update_document,
        handlers::documents::delete_document,
        handlers::documents::delete_document_permanently,
        handlers::documents::download_document,
        handlers::documents::download_qr_code,
        handlers::documents::presigned_link,
        handlers::documents::serve_file,
        // Categories
        handlers::categories::create_category,
        handlers::categories::list_categories,
        handlers::categories::get_category,
        handlers::categories::update_category,
        handlers::categories::delete_category,
        // Admin
        handlers::admin::list_users,
        handlers::admin::create_user,
        handlers::admin::get_user,
        handlers::admin::update_user,
        handlers::admin::deactivate_user,
        handlers::admin::list_audit_logs,
        handlers::admin::get_statistics,
    ),
    components(
        schemas(
            models::DocumentView,
            models::Category,
            models::CategoryView,
            models::User,
            models::UserRole,
            models::AuditLogView,
            models::Statistics,
            models::DailyCount,
            models::CategoryCount,
            handlers::MessageResponse,
            handlers::health::HealthResponse,
            handlers::health::RootResponse,
            handlers::auth::RegisterRequest,
            handlers::auth::LoginRequest,
            handlers::auth::AuthResponse,
            handlers::auth::MeResponse,
            handlers::documents::DocumentResponse,
            handlers::documents::DocumentMessageResponse,
            handlers::documents::DocumentListResponse,
            handlers::documents::PresignedLinkResponse,
            handlers::documents::UpdateDocumentRequest,
            handlers::categories::CreateCategoryRequest,
            handlers::categories::UpdateCategoryRequest,
            handlers::categories::CategoryListResponse,
            handlers::categories::CategoryResponse,
            handlers::categories::CreatedCategoryResponse,
            handlers::categories::UpdatedCategoryResponse,
            handlers::admin::UserListResponse,
            handlers::admin::UserResponse,
            handlers::admin::UserMessageResponse,
            handlers::admin::CreateUserRequest,
            handlers::admin::UpdateUserRequest,
            handlers::admin::AuditLogListResponse,
            handlers::admin::StatisticsResponse,
            // Error
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Liveness and API banner"),
        (name = "auth", description = "Registration, sign-in and the current account"),
        (name = "documents", description = "Document upload, search, QR lookup, download and deletion"),
        (name = "categories", description = "Document categories"),
        (name = "admin", description = "Accounts, audit trail and statistics (admin only)")
    )
)]
pub struct ApiDoc;
