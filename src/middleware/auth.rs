//! Bearer-token authentication for the administrative routes.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::errors::auth_error::AuthError;
use crate::state::AppState;

/// Extract the bearer token from a request.
///
/// Supports two sources:
/// 1. Authorization header: `Authorization: Bearer <token>` (preferred)
/// 2. Query parameter: `?token=<token>` (for clients that can't set headers)
fn extract_token(request: &Request) -> Result<String, AuthError> {
    if let Some(auth_header) = request.headers().get("authorization") {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            return Ok(token.to_string());
        }
        return Err(AuthError::InvalidAuthHeader);
    }

    if let Some(query) = request.uri().query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == "token" {
                return Ok(value.to_string());
            }
        }
    }

    Err(AuthError::MissingAuthHeader)
}

/// Constant-time token comparison. Length differences still return in
/// constant time relative to the secret.
fn token_matches(token: &str, secret: &str) -> bool {
    let token = token.as_bytes();
    let secret = secret.as_bytes();
    if token.len() != secret.len() {
        return false;
    }
    token.ct_eq(secret).into()
}

/// Middleware guarding the admin routes.
///
/// With no admin secret configured the operation is always unauthorized;
/// there is no "open" mode for reload.
pub async fn admin_auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(secret) = state.config.admin_api_secret.as_deref() else {
        tracing::warn!(
            path = %request.uri().path(),
            "admin route hit but no admin secret configured"
        );
        return Err(AuthError::Unauthorized(
            "Admin access is not configured".to_string(),
        ));
    };

    let token = extract_token(&request)?;
    if !token_matches(&token, secret) {
        tracing::warn!(path = %request.uri().path(), "admin token mismatch");
        return Err(AuthError::Unauthorized("Invalid admin token".to_string()));
    }

    Ok(next.run(request).await)
}
