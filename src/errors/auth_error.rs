//! Authentication errors for the admin-protected routes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors produced by the auth middleware.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No Authorization header or token query parameter present
    #[error("Missing authorization")]
    MissingAuthHeader,

    /// Authorization header present but not `Bearer <token>`
    #[error("Invalid authorization header")]
    InvalidAuthHeader,

    /// Token did not match the configured secret, or no secret is configured
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": "unauthorized",
                "message": self.to_string(),
            }
        }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}
