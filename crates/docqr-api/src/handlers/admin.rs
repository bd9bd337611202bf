//! Admin-only endpoints: accounts, audit trail and statistics.

use crate::auth::password::hash_password;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::{parse_role, MessageResponse};
use crate::middleware::audit::AuditResourceId;
use crate::state::DbState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use docqr_core::models::{
    AuditLogFilter, AuditLogView, NewUser, Statistics, User, UserChanges, UserRole,
    DEFAULT_PAGE_LIMIT, MAX_PAGE, MAX_PAGE_LIMIT,
};
use docqr_core::AppError;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Validated page and limit, falling back to `default_limit`.
fn paging(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Result<(i64, i64), AppError> {
    let page = page.unwrap_or(1);
    if !(1..=MAX_PAGE).contains(&page) {
        return Err(AppError::InvalidInput(
            format!("Page must be 1-{}", MAX_PAGE),
        ));
    }
    let limit = limit.unwrap_or(default_limit);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(AppError::InvalidInput("Limit must be 1-100".to_string()));
    }
    Ok((page, limit))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserMessageResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditLogQuery {
    pub user_id: Option<Uuid>,
    /// CREATE, UPDATE, DELETE, VIEW, DOWNLOAD or PERMANENT_DELETE
    pub action: Option<String>,
    /// DOCUMENT, CATEGORY or USER
    pub resource_type: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogListResponse {
    pub logs: Vec<AuditLogView>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatisticsResponse {
    pub statistics: Statistics,
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "admin",
    params(PageQuery),
    responses(
        (status = 200, description = "Accounts, newest first", body = UserListResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(db): State<DbState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let (page, limit) = paging(query.page, query.limit, DEFAULT_PAGE_LIMIT)?;
    let (users, total) = db.users.list(page, limit).await?;

    Ok(Json(UserListResponse {
        users,
        total,
        page,
        limit,
    }))
}

#[utoipa::path(
    post,
    path = "/api/admin/users",
    tag = "admin",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = UserMessageResponse),
        (status = 400, description = "Invalid input or username/email taken", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(db): State<DbState>,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let username = request.username.trim().to_string();
    let email = request.email.trim().to_lowercase();
    let role = parse_role(request.role.as_deref())?.unwrap_or(UserRole::User);

    if db.users.username_taken_by_other(&username, None).await? {
        return Err(AppError::Conflict("Username already exists".to_string()).into());
    }
    if db.users.email_taken_by_other(&email, None).await? {
        return Err(AppError::Conflict("Email already exists".to_string()).into());
    }

    let password_hash = hash_password(&request.password).await?;
    let user = db
        .users
        .create(&NewUser {
            username,
            email,
            password_hash,
            role,
        })
        .await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User created by admin");

    Ok((
        StatusCode::CREATED,
        Extension(AuditResourceId(user.id)),
        Json(UserMessageResponse {
            message: "User created successfully".to_string(),
            user,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account", body = UserResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(db): State<DbState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let user = db.users.get(id).await?.ok_or_else(user_not_found)?;
    Ok(Json(UserResponse { user }))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account updated", body = UserMessageResponse),
        (status = 400, description = "Invalid input or username/email taken", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(db): State<DbState>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let username = request.username.map(|u| u.trim().to_string());
    let email = request.email.map(|e| e.trim().to_lowercase());

    if let Some(username) = &username {
        if db.users.username_taken_by_other(username, Some(id)).await? {
            return Err(AppError::Conflict("Username already exists".to_string()).into());
        }
    }
    if let Some(email) = &email {
        if db.users.email_taken_by_other(email, Some(id)).await? {
            return Err(AppError::Conflict("Email already exists".to_string()).into());
        }
    }

    let password_hash = match request.password.as_deref() {
        Some(password) => Some(hash_password(password).await?),
        None => None,
    };

    let changes = UserChanges {
        username,
        email,
        password_hash,
        role: parse_role(request.role.as_deref())?,
        is_active: request.is_active,
    };

    let user = db
        .users
        .update(id, &changes)
        .await?
        .ok_or_else(user_not_found)?;

    tracing::info!(user_id = %user.id, "User updated by admin");

    Ok(Json(UserMessageResponse {
        message: "User updated successfully".to_string(),
        user,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account deactivated", body = MessageResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn deactivate_user(
    State(db): State<DbState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !db.users.deactivate(id).await? {
        return Err(user_not_found().into());
    }
    tracing::info!(user_id = %id, "User deactivated");
    Ok(Json(MessageResponse::new("User deactivated successfully")))
}

#[utoipa::path(
    get,
    path = "/api/admin/audit-logs",
    tag = "admin",
    params(AuditLogQuery),
    responses(
        (status = 200, description = "Audit entries, newest first", body = AuditLogListResponse),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_audit_logs(
    State(db): State<DbState>,
    Query(query): Query<AuditLogQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let defaults = AuditLogFilter::default();
    let (page, limit) = paging(query.page, query.limit, defaults.limit)?;

    let filter = AuditLogFilter {
        user_id: query.user_id,
        action: query.action.map(|a| a.trim().to_uppercase()).filter(|a| !a.is_empty()),
        resource_type: query
            .resource_type
            .map(|r| r.trim().to_uppercase())
            .filter(|r| !r.is_empty()),
        date_from: query.date_from,
        date_to: query.date_to,
        page,
        limit,
    };

    let (logs, total) = db.audit_logs.list(&filter).await?;

    Ok(Json(AuditLogListResponse {
        logs,
        total,
        page,
        limit,
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/statistics",
    tag = "admin",
    responses((status = 200, description = "Totals and 30-day activity", body = StatisticsResponse)),
    security(("bearer_auth" = []))
)]
pub async fn get_statistics(State(db): State<DbState>) -> Result<impl IntoResponse, HttpAppError> {
    let statistics = db.statistics.statistics().await?;
    Ok(Json(StatisticsResponse { statistics }))
}
