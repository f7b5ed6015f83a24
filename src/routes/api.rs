use axum::{
    Router,
    middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{pricing, webhook};
use crate::state::AppState;
use std::sync::Arc;

/// Create the public API router.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(pricing::health))
        .route("/voice", post(webhook::voice_webhook))
        .route("/pricing/lookup", post(pricing::lookup_pricing))
        .layer(TraceLayer::new_for_http())
}

/// Create the admin router, gated by the bearer-secret middleware.
///
/// With no admin secret configured every request here is 401.
pub fn create_admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/pricing/reload", post(pricing::reload_pricing))
        .layer(middleware::from_fn_with_state(
            state,
            crate::middleware::admin_auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}
