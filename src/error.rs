//! Error types for the moderation service.
//!
//! Errors are converted to appropriate HTTP responses for API clients.
//! `Locked` is a retryable contention signal (423), not a fatal error.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

/// Result type for moderation-service operations
pub type Result<T> = std::result::Result<T, ModerationError>;

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("review case locked by {0}")]
    Locked(String),

    #[error("image decode error: {0}")]
    ImageDecode(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for ModerationError {
    fn status_code(&self) -> StatusCode {
        match self {
            ModerationError::Validation(_) | ModerationError::ImageDecode(_) => {
                StatusCode::BAD_REQUEST
            }
            ModerationError::NotFound(_) => StatusCode::NOT_FOUND,
            ModerationError::Conflict(_) => StatusCode::CONFLICT,
            ModerationError::Locked(_) => StatusCode::LOCKED,
            ModerationError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ModerationError::Forbidden(_) => StatusCode::FORBIDDEN,
            ModerationError::Database(_)
            | ModerationError::Http(_)
            | ModerationError::Config(_)
            | ModerationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        HttpResponse::build(status).json(serde_json::json!({
            "error": self.to_string(),
        }))
    }
}
