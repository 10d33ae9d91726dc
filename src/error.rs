use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::users::repo::StoreError;

/// Message returned for every unexpected failure; details stay in the logs.
pub const INTERNAL_MESSAGE: &str = "An unexpected error occurred";

/// Errors surfaced to API callers. The message of each variant is sent to
/// the client verbatim, so it must never carry internal details.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Internal(String),
}

impl AuthError {
    /// Logs `err` with `context` and collapses it into a generic `Internal`.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        error!(error = %err, "{context}");
        AuthError::Internal(INTERNAL_MESSAGE.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::AlreadyExists(_) => "already_exists",
            AuthError::NotFound(_) => "not_found",
            AuthError::Unauthenticated(_) => "unauthenticated",
            AuthError::PermissionDenied(_) => "permission_denied",
            AuthError::InvalidArgument(_) => "invalid_argument",
            AuthError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::AlreadyExists(_) => StatusCode::CONFLICT,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AuthError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AuthError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(constraint) => {
                tracing::warn!(%constraint, "uniqueness constraint rejected write");
                AuthError::AlreadyExists("Username or email already exists".into())
            }
            StoreError::Database(e) => AuthError::internal("database operation failed", e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "code": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
