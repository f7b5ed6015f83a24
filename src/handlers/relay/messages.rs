//! Relay socket message types and the outbound wire contract.
//!
//! Inbound events arrive as JSON with a `type` tag; anything that fails to
//! decode is dropped by the caller, never answered. Outbound replies are
//! rendered by a pure function over an ordered table of candidate shapes:
//! the relay protocol's exact outbound shape is externally versioned, so a
//! session keeps a cursor into this table and advances it when the
//! provider rejects a send (see [`is_schema_rejection`]).

use serde::Deserialize;
use serde_json::{Value, json};

/// Inbound relay events.
///
/// Field names follow the provider's camelCase wire format. Unknown event
/// kinds decode to `Unknown` so they can be logged and ignored instead of
/// failing the parse.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum RelayInboundMessage {
    /// Handshake. Carries the telephony identifiers; must be silently
    /// acknowledged, never answered with a spoken message.
    #[serde(rename = "setup")]
    Setup {
        #[serde(default, rename = "callSid")]
        call_sid: Option<String>,
        #[serde(default, rename = "sessionId")]
        session_id: Option<String>,
    },

    /// One caller speech turn (or a fragment of one when `last` is false).
    #[serde(rename = "prompt")]
    Prompt {
        #[serde(default, rename = "voicePrompt")]
        voice_prompt: String,
        #[serde(default = "default_true")]
        last: bool,
    },

    /// Caller spoke over the assistant; the provider truncates the audio.
    #[serde(rename = "interrupt")]
    Interrupt {
        #[serde(default, rename = "utteranceUntilInterrupt")]
        utterance_until_interrupt: Option<String>,
    },

    /// Keypad digit.
    #[serde(rename = "dtmf")]
    Dtmf {
        #[serde(default)]
        digit: Option<String>,
    },

    /// Provider-reported error, possibly about our last send.
    #[serde(rename = "error")]
    ProviderError {
        #[serde(default)]
        description: Option<String>,
    },

    /// Anything this server version doesn't know; logged and ignored.
    #[serde(other)]
    Unknown,
}

fn default_true() -> bool {
    true
}

/// Routing for the per-session sender task.
pub enum RelayMessageRoute {
    /// Rendered reply payload
    Reply(Value),
    /// Close the caller socket
    Close,
}

/// Number of candidate outbound shapes.
pub const OUTBOUND_SCHEMA_COUNT: usize = 3;

/// Render one reply in the shape selected by `schema_index`.
///
/// Pure: same inputs, same payload. The candidates, in priority order:
/// index 0 is the provider's token shape, index 1 spells the text field
/// out, index 2 is the minimal kind/payload/end_of_turn contract. An
/// index past the table clamps to the last candidate.
pub fn render_reply(text: &str, last: bool, schema_index: usize) -> Value {
    match schema_index {
        0 => json!({"type": "text", "token": text, "last": last}),
        1 => json!({"type": "text", "text": text, "last": last}),
        _ => json!({"kind": "text", "payload": text, "end_of_turn": last}),
    }
}

/// Whether a provider error description indicates our outbound message
/// shape was rejected (as opposed to some unrelated provider problem).
pub fn is_schema_rejection(description: &str) -> bool {
    let lower = description.to_lowercase();
    ["schema", "invalid message", "unknown type", "malformed", "unsupported message"]
        .iter()
        .any(|needle| lower.contains(needle))
}
