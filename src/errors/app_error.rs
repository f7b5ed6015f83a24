//! Application-level error type for HTTP handlers.
//!
//! Every REST handler returns `AppResult<T>`; the `IntoResponse` impl maps
//! each variant to a status code and a small JSON body so callers never see
//! raw internals.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by REST handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request was malformed (empty input, bad field values)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Pricing table load/reload failed
    #[error("Pricing error: {0}")]
    Pricing(#[from] crate::pricing::PricingError),

    /// Upstream service failure
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Anything unexpected
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for REST handlers.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Pricing(_) => (StatusCode::UNPROCESSABLE_ENTITY, "pricing_error"),
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
