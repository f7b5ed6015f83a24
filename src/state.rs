//! Shared application state.

use std::time::Instant;

use dashmap::DashMap;
use tracing::warn;

use crate::config::ServerConfig;
use crate::core::transfer::TransferClient;
use crate::pricing::SharedPricingTable;

/// Bookkeeping entry for one live relay session.
///
/// The registry exists for cleanup and observability only; no session
/// mutates another's entry.
#[derive(Debug)]
pub struct SessionInfo {
    /// Telephony call id, known once the setup handshake arrives
    pub call_sid: Option<String>,
    pub started_at: Instant,
}

/// Application state shared across handlers.
pub struct AppState {
    pub config: ServerConfig,
    /// Current pricing snapshot holder
    pub pricing: SharedPricingTable,
    /// Active relay sessions keyed by random session id
    pub sessions: DashMap<String, SessionInfo>,
    /// Live-transfer collaborator, None when not configured
    pub transfer: Option<TransferClient>,
    /// Shared HTTP client for pricing source fetches
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let transfer = if config.has_transfer() {
            match TransferClient::new(
                config.twilio_account_sid.clone().unwrap_or_default(),
                config.twilio_auth_token.clone().unwrap_or_default(),
                config.transfer_number.clone().unwrap_or_default(),
            ) {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!("transfer client unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        Self {
            config,
            pricing: SharedPricingTable::default(),
            sessions: DashMap::new(),
            transfer,
            http: reqwest::Client::new(),
        }
    }

    /// Number of currently active relay sessions.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}
