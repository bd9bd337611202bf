use crate::auth::models::AuthUser;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::MessageResponse;
use crate::middleware::audit::AuditResourceId;
use crate::state::DbState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use docqr_core::models::{Category, CategoryChanges, CategoryView};
use docqr_core::AppError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Category name is required"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Category name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryListResponse {
    pub categories: Vec<CategoryView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub category: CategoryView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedCategoryResponse {
    pub message: String,
    pub category: Category,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdatedCategoryResponse {
    pub message: String,
    pub category: CategoryView,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

fn not_found() -> AppError {
    AppError::NotFound("Category not found".to_string())
}

#[utoipa::path(
    post,
    path = "/api/categories",
    tag = "categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CreatedCategoryResponse),
        (status = 400, description = "Invalid input or name already taken", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_category(
    State(db): State<DbState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateCategoryRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Category name is required".to_string()).into());
    }
    let description = trimmed(request.description);

    let category = db
        .categories
        .create(name, description.as_deref(), auth.id())
        .await?;

    tracing::info!(category_id = %category.id, name = %category.name, "Category created");

    Ok((
        StatusCode::CREATED,
        Extension(AuditResourceId(category.id)),
        Json(CreatedCategoryResponse {
            message: "Category created successfully".to_string(),
            category,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "categories",
    responses((status = 200, description = "All categories by name", body = CategoryListResponse)),
    security(("bearer_auth" = []))
)]
pub async fn list_categories(State(db): State<DbState>) -> Result<impl IntoResponse, HttpAppError> {
    let categories = db.categories.list().await?;
    Ok(Json(CategoryListResponse { categories }))
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = CategoryResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_category(
    State(db): State<DbState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let category = db.categories.get(id).await?.ok_or_else(not_found)?;
    Ok(Json(CategoryResponse { category }))
}

#[utoipa::path(
    put,
    path = "/api/categories/{id}",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = UpdatedCategoryResponse),
        (status = 400, description = "Invalid input or name already taken", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_category(
    State(db): State<DbState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateCategoryRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let changes = CategoryChanges {
        name: trimmed(request.name),
        description: trimmed(request.description),
    };
    if changes.name.as_deref() == Some("") {
        return Err(AppError::InvalidInput("Category name cannot be empty".to_string()).into());
    }

    let category = db
        .categories
        .update(id, &changes, auth.id())
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(UpdatedCategoryResponse {
        message: "Category updated successfully".to_string(),
        category,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    tag = "categories",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted", body = MessageResponse),
        (status = 400, description = "Active documents still use this category", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_category(
    State(db): State<DbState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    if !db.categories.delete(id).await? {
        return Err(not_found().into());
    }
    Ok(Json(MessageResponse::new("Category deleted successfully")))
}
