//! Inbound call webhook.
//!
//! The telephony provider posts here when a call comes in; the response is
//! a small markup document telling it to open the bidirectional relay to
//! `/relay`, speak the greeting, and (optionally) use a specific TTS
//! voice. The relay session itself never sees this leg.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::state::AppState;

/// Handle the new-call webhook.
pub async fn voice_webhook(State(state): State<Arc<AppState>>) -> Response {
    let config = &state.config;
    let document = relay_document(
        &config.relay_url(),
        &config.greeting,
        config.tts_voice.as_deref(),
    );

    info!(relay_url = %config.relay_url(), "answering call webhook");

    ([(CONTENT_TYPE, "application/xml")], document).into_response()
}

/// Build the relay-open document.
fn relay_document(relay_url: &str, greeting: &str, voice: Option<&str>) -> String {
    let voice_attr = match voice {
        Some(v) => format!(" voice=\"{}\"", xml_escape(v)),
        None => String::new(),
    };
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Response>\n\
           <Connect>\n\
             <ConversationRelay url=\"{}\" welcomeGreeting=\"{}\"{} />\n\
           </Connect>\n\
         </Response>",
        xml_escape(relay_url),
        xml_escape(greeting),
        voice_attr
    )
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
