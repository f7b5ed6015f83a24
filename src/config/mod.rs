//! Server configuration.
//!
//! All runtime configuration comes from the environment (optionally seeded
//! from a `.env` file by the binary). Missing optional keys degrade the
//! related feature instead of failing startup: no model key means the
//! gateway answers from local intents only, no Twilio credentials means
//! transfer requests fall back to speaking the store's phone number.

mod facts;

pub use facts::BusinessFacts;

use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default bind host.
const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port.
const DEFAULT_PORT: u16 = 8080;

/// Default chat completions model.
const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";

/// Default realtime model for the streaming transport.
const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An env var was present but unparseable
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Which transport the upstream model client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTransport {
    /// One HTTP request per utterance
    #[default]
    Completion,
    /// One persistent realtime socket per call
    Realtime,
}

/// Server configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    /// Public base URL advertised to the telephony provider, used to build
    /// the relay WebSocket URL in the webhook document
    /// (e.g. "https://gateway.example.com")
    pub public_url: String,

    // Upstream model settings
    /// OpenAI API key; absent means local-intents-only mode
    pub openai_api_key: Option<String>,
    /// Chat completions model for the single-shot transport
    pub completion_model: String,
    /// Realtime model for the streaming transport
    pub realtime_model: String,
    /// Which transport to drive per call
    pub model_transport: ModelTransport,
    /// Override for the completions endpoint (tests point this at a mock)
    pub completion_api_base: Option<String>,
    /// Override for the realtime socket endpoint (tests, self-hosted relays)
    pub realtime_api_url: Option<String>,

    // Pricing table
    /// File path or http(s) URL of the pricing source (.json or .csv)
    pub pricing_source: Option<String>,

    // Admin auth
    /// Bearer secret for /pricing/reload; absent means reload is always 401
    pub admin_api_secret: Option<String>,

    // Call transfer
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    /// Human-staffed number live calls are redirected to
    pub transfer_number: Option<String>,

    // Relay leg
    /// Greeting spoken by the provider before the first utterance
    pub greeting: String,
    /// Optional TTS voice selector passed through to the provider
    pub tts_voice: Option<String>,

    // Business facts feeding canned answers and the model system prompt
    pub facts: BusinessFacts,
}

impl ServerConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                value: raw.clone(),
            })?,
            Err(_) => DEFAULT_PORT,
        };

        let model_transport = match env::var("MODEL_TRANSPORT").ok().as_deref() {
            None | Some("completion") => ModelTransport::Completion,
            Some("realtime") => ModelTransport::Realtime,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "MODEL_TRANSPORT".to_string(),
                    value: other.to_string(),
                });
            }
        };

        let facts = BusinessFacts::from_env();

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port,
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| format!("http://localhost:{DEFAULT_PORT}")),
            openai_api_key: non_empty(env::var("OPENAI_API_KEY").ok()),
            completion_model: env::var("COMPLETION_MODEL")
                .unwrap_or_else(|_| DEFAULT_COMPLETION_MODEL.to_string()),
            realtime_model: env::var("REALTIME_MODEL")
                .unwrap_or_else(|_| DEFAULT_REALTIME_MODEL.to_string()),
            model_transport,
            completion_api_base: non_empty(env::var("COMPLETION_API_BASE").ok()),
            realtime_api_url: non_empty(env::var("REALTIME_API_URL").ok()),
            pricing_source: non_empty(env::var("PRICING_SOURCE").ok()),
            admin_api_secret: non_empty(env::var("ADMIN_API_SECRET").ok()),
            twilio_account_sid: non_empty(env::var("TWILIO_ACCOUNT_SID").ok()),
            twilio_auth_token: non_empty(env::var("TWILIO_AUTH_TOKEN").ok()),
            transfer_number: non_empty(env::var("TRANSFER_NUMBER").ok()),
            greeting: env::var("GREETING").unwrap_or_else(|_| facts.default_greeting()),
            tts_voice: non_empty(env::var("TTS_VOICE").ok()),
            facts,
        })
    }

    /// Whether an upstream model is configured at all.
    pub fn has_model(&self) -> bool {
        self.openai_api_key.is_some()
    }

    /// Whether the live-transfer collaborator is configured.
    pub fn has_transfer(&self) -> bool {
        self.twilio_account_sid.is_some()
            && self.twilio_auth_token.is_some()
            && self.transfer_number.is_some()
    }

    /// Relay WebSocket URL handed to the telephony provider.
    pub fn relay_url(&self) -> String {
        let base = self.public_url.trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}/relay")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}/relay")
        } else {
            format!("wss://{base}/relay")
        }
    }
}

/// Treat empty env values the same as unset ones.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
