use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique account columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Nickname,
}

impl UniqueField {
    pub fn as_str(&self) -> &'static str {
        match self {
            UniqueField::Email => "email",
            UniqueField::Nickname => "nickname",
        }
    }
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum UserError {
    /// Uniform for unknown email, wrong password, inactive and password-less accounts
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found: {0}")]
    NotFound(Uuid),

    #[error("User with {field} '{value}' already exists")]
    Conflict { field: UniqueField, value: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Token signing error: {0}")]
    Token(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type UserResult<T> = Result<T, UserError>;

impl UserError {
    pub fn conflict(field: UniqueField, value: impl Into<String>) -> Self {
        UserError::Conflict {
            field,
            value: value.into(),
        }
    }
}

impl From<sea_orm::DbErr> for UserError {
    fn from(err: sea_orm::DbErr) -> Self {
        UserError::Storage(err.to_string())
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::InvalidCredentials => {
                AppError::Unauthorized("Invalid credentials".to_string())
            }
            UserError::NotFound(id) => AppError::NotFound(format!("User {} not found", id)),
            UserError::Conflict { field, value } => AppError::Conflict {
                message: format!("User with {} '{}' already exists", field, value),
                details: Some(serde_json::json!({ "field": field.as_str(), "value": value })),
            },
            UserError::Unauthorized(msg) => AppError::Unauthorized(msg),
            UserError::InvalidToken => {
                AppError::Unauthorized("Invalid or expired token".to_string())
            }
            UserError::Forbidden(msg) => AppError::Forbidden(msg),
            UserError::InvalidArgument(msg) => AppError::InvalidArgument(msg),
            UserError::PasswordHash(msg) => {
                AppError::InternalServerError(format!("Password hashing: {}", msg))
            }
            UserError::Token(msg) => AppError::InternalServerError(format!("Token: {}", msg)),
            UserError::Storage(msg) => AppError::ServiceUnavailable(msg),
            UserError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}
