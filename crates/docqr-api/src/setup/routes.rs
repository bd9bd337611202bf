//! Route configuration and setup.

use crate::auth::middleware::{auth_middleware, require_admin};
use crate::handlers::{admin, auth, categories, documents, health};
use crate::middleware::audit::{record_audit, AuditAction, AuditContext, ResourceType};
use crate::state::AppState;
use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use docqr_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa_rapidoc::RapiDoc;

/// Room for multipart boundaries and text fields on top of the file itself.
const MULTIPART_ENVELOPE_BYTES: usize = 1024 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;
    let auth_state = Arc::new(state.auth.clone());

    let api = public_api_routes().merge(
        protected_routes(config, &state)
            .route_layer(from_fn_with_state(auth_state, auth_middleware)),
    );

    let prefix = config.api_prefix().trim_end_matches('/');
    let api = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(prefix, api)
    };

    let http_concurrency_limit = config.http_concurrency_limit().max(1);
    let body_limit = config.max_file_size_bytes() + MULTIPART_ENVELOPE_BYTES;
    tracing::info!(
        http_concurrency_limit,
        body_limit,
        api_prefix = %config.api_prefix(),
        "HTTP layers configured"
    );

    let app = Router::new()
        .route("/health", get(health::health_check))
        .merge(api)
        .merge(
            RapiDoc::with_openapi(
                "/api-docs/openapi.json",
                crate::api_doc::get_openapi_spec(config.api_prefix()),
            )
            .path("/docs"),
        )
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| {
                o.parse::<HeaderValue>()
                    .with_context(|| format!("Invalid CORS origin: {}", o))
            })
            .collect::<Result<Vec<_>, _>>()?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

/// Routes under the API prefix that need no token.
fn public_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health::api_root))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
}

/// Routes that need a valid bearer token. Admin-only handlers add `require_admin`
/// as their outermost layer so the audit layer only sees authorized calls.
fn protected_routes(config: &Config, state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let queue = state.audit.clone();
    let trusted_proxy_count = config.trusted_proxy_count();
    let audit = |action: AuditAction, resource: ResourceType| {
        from_fn_with_state(
            AuditContext::new(queue.clone(), action, resource, trusted_proxy_count),
            record_audit,
        )
    };
    let admin_only = || from_fn(require_admin);

    use AuditAction::{Create, Delete, Download, PermanentDelete, Update, View};
    use ResourceType::{Category, Document, User};

    let admin = Router::new()
        .route("/admin/users", get(admin::list_users))
        .route(
            "/admin/users",
            post(admin::create_user).layer(audit(Create, User)),
        )
        .route("/admin/users/{id}", get(admin::get_user))
        .route(
            "/admin/users/{id}",
            put(admin::update_user).layer(audit(Update, User)),
        )
        .route(
            "/admin/users/{id}",
            delete(admin::deactivate_user).layer(audit(Delete, User)),
        )
        .route("/admin/audit-logs", get(admin::list_audit_logs))
        .route("/admin/statistics", get(admin::get_statistics))
        .route_layer(admin_only());

    Router::new()
        // Auth
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        // Documents
        .route(
            "/documents",
            post(documents::upload_document).layer(audit(Create, Document)),
        )
        .route("/documents", get(documents::list_documents))
        .route(
            "/documents/qr/{*payload}",
            get(documents::get_document_by_qr).layer(audit(View, Document)),
        )
        .route(
            "/documents/file/{container}/{key}",
            get(documents::serve_file),
        )
        .route(
            "/documents/{id}",
            get(documents::get_document).layer(audit(View, Document)),
        )
        .route(
            "/documents/{id}",
            put(documents::update_document).layer(audit(Update, Document)),
        )
        .route(
            "/documents/{id}",
            delete(documents::delete_document).layer(audit(Delete, Document)),
        )
        .route(
            "/documents/{id}/permanent",
            delete(documents::delete_document_permanently)
                .layer(audit(PermanentDelete, Document))
                .layer(admin_only()),
        )
        .route(
            "/documents/{id}/download",
            get(documents::download_document).layer(audit(Download, Document)),
        )
        .route("/documents/{id}/qr", get(documents::download_qr_code))
        .route("/documents/{id}/link", get(documents::presigned_link))
        // Categories
        .route("/categories", get(categories::list_categories))
        .route(
            "/categories",
            post(categories::create_category)
                .layer(audit(Create, Category))
                .layer(admin_only()),
        )
        .route("/categories/{id}", get(categories::get_category))
        .route(
            "/categories/{id}",
            put(categories::update_category)
                .layer(audit(Update, Category))
                .layer(admin_only()),
        )
        .route(
            "/categories/{id}",
            delete(categories::delete_category)
                .layer(audit(Delete, Category))
                .layer(admin_only()),
        )
        .merge(admin)
}
