//! Pricing REST handlers and the health probe.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::errors::app_error::{AppError, AppResult};
use crate::pricing::{self, PricingEntry, PricingTable};
use crate::state::AppState;

/// Batch lookup request.
#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    pub zips: Vec<String>,
}

/// Batch lookup response: resolved entries, order preserved.
#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub entries: Vec<PricingEntry>,
}

/// Reload outcome.
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub status: &'static str,
    pub rows: usize,
}

/// `POST /pricing/reload` - rebuild the table from the configured source.
///
/// Admin-gated by middleware. On failure the table is left empty and the
/// error message is returned, matching boot-time semantics.
pub async fn reload_pricing(State(state): State<Arc<AppState>>) -> AppResult<Json<ReloadResponse>> {
    let source = state
        .config
        .pricing_source
        .clone()
        .ok_or(AppError::Pricing(pricing::PricingError::NoSource))?;

    match pricing::load(&source, &state.http).await {
        Ok(table) => {
            let rows = table.len();
            state.pricing.replace(table);
            info!(rows, source = %source, "pricing table reloaded");
            Ok(Json(ReloadResponse {
                status: "reloaded",
                rows,
            }))
        }
        Err(e) => {
            warn!(source = %source, "pricing reload failed: {e}");
            state.pricing.replace(PricingTable::default());
            Err(AppError::Pricing(e))
        }
    }
}

/// `POST /pricing/lookup` - resolve a batch of postal codes.
///
/// Order preserved; duplicates and unknown codes dropped. Empty input is a
/// client error, an all-unknown batch is not-found.
pub async fn lookup_pricing(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LookupRequest>,
) -> AppResult<Json<LookupResponse>> {
    if request.zips.is_empty() {
        return Err(AppError::BadRequest("zips must not be empty".to_string()));
    }

    let snapshot = state.pricing.snapshot();
    let mut seen = Vec::new();
    let mut entries = Vec::new();
    for zip in &request.zips {
        let cleaned: String = zip.chars().filter(|c| c.is_ascii_digit()).collect();
        if seen.contains(&cleaned) {
            continue;
        }
        seen.push(cleaned.clone());
        if let Some(entry) = snapshot.lookup(zip) {
            entries.push(entry.clone());
        }
    }

    if entries.is_empty() {
        return Err(AppError::NotFound(
            "none of the requested zips are in the delivery table".to_string(),
        ));
    }

    Ok(Json(LookupResponse { entries }))
}

/// `GET /health` - liveness plus a couple of gauges.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "active_sessions": state.active_sessions(),
        "pricing_rows": state.pricing.snapshot().len(),
        "model_configured": state.config.has_model(),
        "transfer_configured": state.transfer.is_some(),
    }))
}
