//! Persistent realtime transport.
//!
//! One WebSocket per call, reused for every utterance. Per turn the client
//! emits a conversation-item-create event followed by a response-create
//! event, then the read task feeds partial text deltas back to the owning
//! session as [`ModelEvent`]s until the response-done event. The session
//! owns lifecycle coupling: closing the caller leg closes this socket and
//! a dead model socket is reported so the session can fall back locally.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use http::header::{AUTHORIZATION, HeaderValue};
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::{debug, info, warn};

use super::base::{ModelError, ModelEvent, ModelResult};

/// Public realtime endpoint.
const DEFAULT_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Channel capacity for outgoing client events.
const WS_CHANNEL_CAPACITY: usize = 64;

/// Close a model socket that produces no event for this long.
const MODEL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// How often the read task checks for idleness.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(15);

/// Streaming client for the realtime transport.
///
/// Cheap to clone; all mutable state is behind shared handles.
#[derive(Clone)]
pub struct RealtimeModelClient {
    api_key: String,
    model: String,
    instructions: String,
    url_override: Option<String>,
    /// Shared with the read task so liveness checks are lock-free
    connected: Arc<AtomicBool>,
    ws_sender: Arc<Mutex<Option<mpsc::Sender<Value>>>>,
    read_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RealtimeModelClient {
    pub fn new(
        api_key: String,
        model: String,
        instructions: String,
        url_override: Option<String>,
    ) -> Self {
        Self {
            api_key,
            model,
            instructions,
            url_override,
            connected: Arc::new(AtomicBool::new(false)),
            ws_sender: Arc::new(Mutex::new(None)),
            read_handle: Arc::new(Mutex::new(None)),
        }
    }

    fn build_ws_url(&self) -> String {
        match &self.url_override {
            Some(url) => url.clone(),
            None => format!("{}?model={}", DEFAULT_REALTIME_URL, self.model),
        }
    }

    /// Connect and start the read task.
    ///
    /// Every server-side development (text delta, turn completion, error,
    /// socket loss, idle timeout) is delivered through `events`; a failed
    /// connect returns the error directly so the session can fail over to
    /// an apology instead of ever reaching a silent "ready" state.
    pub async fn connect(&self, events: mpsc::Sender<ModelEvent>) -> ModelResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        let url = self.build_ws_url();
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ModelError::ConnectionFailed(e.to_string()))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| ModelError::ConnectionFailed(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| ModelError::ConnectionFailed(e.to_string()))?;

        info!(model = %self.model, "connected to realtime model socket");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<Value>(WS_CHANNEL_CAPACITY);
        *self.ws_sender.lock().await = Some(tx.clone());
        self.connected.store(true, Ordering::SeqCst);

        let connected = self.connected.clone();
        let ws_sender = self.ws_sender.clone();

        let handle = tokio::spawn(async move {
            let mut last_event = Instant::now();

            loop {
                tokio::select! {
                    // Outgoing client events
                    maybe_event = rx.recv() => {
                        let Some(event) = maybe_event else { break };
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("failed to serialize model event: {e}");
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            warn!("model socket send failed: {e}");
                            let _ = events
                                .send(ModelEvent::Failed(ModelError::WebSocketError(e.to_string())))
                                .await;
                            break;
                        }
                    }

                    // Incoming server events
                    maybe_msg = ws_stream.next() => {
                        last_event = Instant::now();
                        match maybe_msg {
                            Some(Ok(Message::Text(text))) => {
                                handle_server_event(&text, &events).await;
                            }
                            Some(Ok(Message::Ping(data))) => {
                                let _ = ws_sink.send(Message::Pong(data)).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                info!("model socket closed by server");
                                let _ = events
                                    .send(ModelEvent::Failed(ModelError::WebSocketError(
                                        "closed by server".to_string(),
                                    )))
                                    .await;
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("model socket error: {e}");
                                let _ = events
                                    .send(ModelEvent::Failed(ModelError::WebSocketError(e.to_string())))
                                    .await;
                                break;
                            }
                            Some(Ok(_)) => {}
                        }
                    }

                    // Idle bound so an abandoned model leg cannot leak
                    _ = tokio::time::sleep(IDLE_CHECK_INTERVAL) => {
                        if last_event.elapsed() > MODEL_IDLE_TIMEOUT {
                            warn!(
                                idle_secs = last_event.elapsed().as_secs(),
                                "model socket idle, closing"
                            );
                            let _ = events
                                .send(ModelEvent::Failed(ModelError::Timeout(
                                    "model socket idle".to_string(),
                                )))
                                .await;
                            break;
                        }
                    }
                }
            }

            connected.store(false, Ordering::SeqCst);
            *ws_sender.lock().await = None;
            debug!("model socket read task ended");
        });

        *self.read_handle.lock().await = Some(handle);

        // Text-only session carrying the business-facts instructions
        self.send_event(json!({
            "type": "session.update",
            "session": {
                "modalities": ["text"],
                "instructions": self.instructions,
            }
        }))
        .await?;

        Ok(())
    }

    /// Whether the socket is up.
    pub fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Submit one utterance and request a response for it.
    pub async fn send_utterance(&self, text: &str) -> ModelResult<()> {
        if !self.is_ready() {
            return Err(ModelError::NotConnected);
        }

        self.send_event(json!({
            "type": "conversation.item.create",
            "item": {
                "type": "message",
                "role": "user",
                "content": [{"type": "input_text", "text": text}],
            }
        }))
        .await?;

        self.send_event(json!({
            "type": "response.create",
            "response": {"modalities": ["text"]}
        }))
        .await
    }

    /// Tear down the model leg. Idempotent.
    pub async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        *self.ws_sender.lock().await = None;
        if let Some(handle) = self.read_handle.lock().await.take() {
            handle.abort();
        }
        debug!("model socket closed");
    }

    async fn send_event(&self, event: Value) -> ModelResult<()> {
        let guard = self.ws_sender.lock().await;
        match guard.as_ref() {
            Some(sender) => sender
                .send(event)
                .await
                .map_err(|e| ModelError::WebSocketError(e.to_string())),
            None => Err(ModelError::NotConnected),
        }
    }
}

/// Decode one server event defensively; unknown shapes are no-ops.
async fn handle_server_event(text: &str, events: &mpsc::Sender<ModelEvent>) {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        debug!("dropping unparseable model event");
        return;
    };
    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();

    if kind.ends_with("output_text.delta")
        || kind.ends_with("text.delta")
        || kind.ends_with("audio_transcript.delta")
    {
        if let Some(delta) = value
            .get("delta")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
        {
            let _ = events.send(ModelEvent::Delta(delta.to_string())).await;
        }
        return;
    }

    match kind {
        "response.done" | "response.completed" => {
            let _ = events.send(ModelEvent::TurnDone).await;
        }
        "error" => {
            let message = value
                .pointer("/error/message")
                .or_else(|| value.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown model error");
            warn!(%message, "model reported error");
            let _ = events
                .send(ModelEvent::Failed(ModelError::WebSocketError(
                    message.to_string(),
                )))
                .await;
        }
        other => {
            tracing::trace!(kind = other, "unhandled model event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_ws_url_default() {
        let client = RealtimeModelClient::new(
            "key".to_string(),
            "gpt-4o-realtime-preview".to_string(),
            String::new(),
            None,
        );
        let url = client.build_ws_url();
        assert!(url.starts_with("wss://api.openai.com"));
        assert!(url.contains("gpt-4o-realtime-preview"));
    }

    #[test]
    fn test_build_ws_url_override() {
        let client = RealtimeModelClient::new(
            "key".to_string(),
            "m".to_string(),
            String::new(),
            Some("ws://127.0.0.1:9999/realtime".to_string()),
        );
        assert_eq!(client.build_ws_url(), "ws://127.0.0.1:9999/realtime");
    }

    #[tokio::test]
    async fn test_send_utterance_requires_connection() {
        let client =
            RealtimeModelClient::new("key".to_string(), "m".to_string(), String::new(), None);
        assert!(matches!(
            client.send_utterance("hi").await,
            Err(ModelError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_server_delta_events_forwarded() {
        let (tx, mut rx) = mpsc::channel(8);
        handle_server_event(
            r#"{"type":"response.output_text.delta","delta":"We close"}"#,
            &tx,
        )
        .await;
        match rx.recv().await {
            Some(ModelEvent::Delta(d)) => assert_eq!(d, "We close"),
            other => panic!("expected Delta, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_done_event_forwarded() {
        let (tx, mut rx) = mpsc::channel(8);
        handle_server_event(r#"{"type":"response.done","response":{"id":"r1"}}"#, &tx).await;
        assert!(matches!(rx.recv().await, Some(ModelEvent::TurnDone)));
    }

    #[tokio::test]
    async fn test_malformed_server_event_is_noop() {
        let (tx, mut rx) = mpsc::channel(8);
        handle_server_event("not json at all", &tx).await;
        handle_server_event(r#"{"type":"something.unknown"}"#, &tx).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_error_event_becomes_failed() {
        let (tx, mut rx) = mpsc::channel(8);
        handle_server_event(
            r#"{"type":"error","error":{"message":"bad session"}}"#,
            &tx,
        )
        .await;
        match rx.recv().await {
            Some(ModelEvent::Failed(e)) => assert!(e.to_string().contains("bad session")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
