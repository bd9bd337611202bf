pub mod admin;
pub mod auth;
pub mod categories;
pub mod documents;
pub mod health;

use docqr_core::models::UserRole;
use docqr_core::AppError;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Optional role field of account requests.
pub(crate) fn parse_role(role: Option<&str>) -> Result<Option<UserRole>, AppError> {
    role.map(|r| {
        r.parse::<UserRole>()
            .map_err(|_| AppError::InvalidInput("Invalid role".to_string()))
    })
    .transpose()
}
