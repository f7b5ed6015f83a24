//! Upstream language-model clients.
//!
//! Two interchangeable transports translate a caller utterance into an
//! assistant reply: a single-shot chat-completions call and a persistent
//! realtime WebSocket reused across the whole call. Both convert every
//! upstream failure into a recoverable [`ModelError`]; the relay session
//! turns those into caller-visible fallback sentences.

mod base;
mod completion;
mod realtime;

pub use base::{ModelError, ModelEvent, ModelResult};
pub use completion::CompletionClient;
pub use realtime::RealtimeModelClient;
