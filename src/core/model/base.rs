//! Shared types for the upstream model transports.

use thiserror::Error;

/// Errors that can occur while talking to the model service.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Connection to the service failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Service answered with a non-success status
    #[error("Upstream returned {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("Malformed response body: {0}")]
    MalformedBody(String),

    /// Request or socket exceeded its time bound
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// WebSocket-level failure
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Streaming client used before connect or after close
    #[error("Not connected")]
    NotConnected,
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Events the realtime transport feeds back into the owning session.
#[derive(Debug)]
pub enum ModelEvent {
    /// Partial answer text; forward downstream immediately
    Delta(String),
    /// The current response finished
    TurnDone,
    /// The model leg failed; the session decides how to degrade
    Failed(ModelError),
}
