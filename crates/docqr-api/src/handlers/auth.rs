use crate::auth::models::AuthUser;
use crate::auth::password::{hash_password, verify_password};
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::handlers::{parse_role, MessageResponse};
use crate::state::{AuthState, DbState};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use docqr_core::models::{NewUser, User, UserRole};
use docqr_core::AppError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    /// admin or user (default user)
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// Username or email
    #[validate(length(min = 1, message = "Username and password are required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Username and password are required"))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub user: User,
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
}

/// Create an account and sign it in.
///
/// Known limitation: the endpoint is public and honours `role`, so any caller can create
/// an admin account. Deployments that expose it should put registration behind a proxy
/// rule or seed admins with the `seed` binary and block `role: "admin"` upstream.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input or username/email taken", body = ErrorResponse)
    )
)]
pub async fn register(
    State(db): State<DbState>,
    State(auth): State<AuthState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let username = request.username.trim().to_string();
    let email = request.email.trim().to_lowercase();
    let role = parse_role(request.role.as_deref())?.unwrap_or(UserRole::User);

    if db.users.username_or_email_taken(&username, &email).await? {
        return Err(AppError::Conflict("Username or email already exists".to_string()).into());
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
    let token = auth.jwt.issue(&user)?;

    if user.is_admin() {
        tracing::warn!(user_id = %user.id, "Admin account created through public registration");
    } else {
        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
    }

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User registered successfully".to_string(),
            user,
            token,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 400, description = "Missing credentials", body = ErrorResponse),
        (status = 401, description = "Invalid credentials or deactivated account", body = ErrorResponse)
    )
)]
pub async fn login(
    State(db): State<DbState>,
    State(auth): State<AuthState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let login = request.username.trim();

    let Some(credentials) = db.users.find_by_login(login).await? else {
        tracing::debug!("Login for unknown account");
        return Err(AppError::Unauthorized("Invalid credentials".to_string()).into());
    };

    if !credentials.user.is_active {
        return Err(AppError::Unauthorized("Account is deactivated".to_string()).into());
    }

    if !verify_password(&request.password, &credentials.password_hash).await? {
        tracing::debug!(user_id = %credentials.user.id, "Login with wrong password");
        return Err(AppError::Unauthorized("Invalid credentials".to_string()).into());
    }

    let user = credentials.user;
    let token = auth.jwt.issue(&user)?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        user,
        token,
    }))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current account", body = MeResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(MeResponse { user })
}

/// Tokens are stateless; the client discards its copy.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses((status = 200, description = "Signed out", body = MessageResponse)),
    security(("bearer_auth" = []))
)]
pub async fn logout(auth: AuthUser) -> impl IntoResponse {
    tracing::debug!(user_id = %auth.id(), "User logged out");
    Json(MessageResponse::new("Logged out successfully"))
}
