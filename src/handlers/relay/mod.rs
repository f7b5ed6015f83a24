//! Relay socket handling: the per-call conversation core.
//!
//! `handler` owns the WebSocket plumbing (upgrade, split, sender task,
//! event loop); `session` is the explicit per-call state machine; and
//! `messages` defines the inbound event kinds plus the outbound wire
//! contract with its schema-negotiation table.

mod handler;
mod messages;
mod session;

pub use handler::relay_handler;
pub use messages::{
    OUTBOUND_SCHEMA_COUNT, RelayInboundMessage, RelayMessageRoute, is_schema_rejection,
    render_reply,
};
pub use session::{Phase, RelaySession};
