//! Relay WebSocket route configuration.
//!
//! # Endpoint
//!
//! `GET /relay` - WebSocket upgrade for the call-relay connection
//!
//! # Protocol
//!
//! After the upgrade the provider sends:
//! 1. a `setup` event carrying the telephony identifiers
//! 2. `prompt` events with transcribed caller utterances (end-of-turn
//!    flagged with `last`)
//! 3. `interrupt` / `dtmf` / `error` events as the call develops
//!
//! The server answers each completed prompt with one or more text-reply
//! events, the final one flagged as end of turn.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::relay::relay_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the relay WebSocket router.
pub fn create_relay_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/relay", get(relay_handler))
        .layer(TraceLayer::new_for_http())
}
