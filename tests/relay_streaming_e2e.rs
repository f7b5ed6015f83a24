//! Streaming-transport relay tests against a fake realtime model server.
//!
//! The fake server implements just enough of the realtime protocol: it
//! accepts the socket, ignores session updates, and answers every
//! response-create with two text deltas and a done event.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use storeline_gateway::config::{BusinessFacts, ModelTransport, ServerConfig};
use storeline_gateway::routes::{create_api_router, create_relay_router};
use storeline_gateway::state::AppState;

fn streaming_config(realtime_api_url: String) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        public_url: "http://127.0.0.1:0".to_string(),
        openai_api_key: Some("test-key".to_string()),
        completion_model: "gpt-4o-mini".to_string(),
        realtime_model: "gpt-4o-realtime-preview".to_string(),
        model_transport: ModelTransport::Realtime,
        completion_api_base: None,
        realtime_api_url: Some(realtime_api_url),
        pricing_source: None,
        admin_api_secret: None,
        twilio_account_sid: None,
        twilio_auth_token: None,
        transfer_number: None,
        greeting: "Hi".to_string(),
        tts_voice: None,
        facts: BusinessFacts::default(),
    }
}

/// Minimal realtime-protocol mock: deltas then done, per response request.
async fn spawn_fake_model() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Text(text) = msg else { continue };
                    let value: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
                    if value["type"] == "response.create" {
                        for delta in ["We pour tastings ", "every Saturday."] {
                            let event = json!({
                                "type": "response.output_text.delta",
                                "delta": delta,
                            });
                            let _ = ws.send(Message::Text(event.to_string().into())).await;
                        }
                        let done = json!({"type": "response.done"});
                        let _ = ws.send(Message::Text(done.to_string().into())).await;
                    }
                }
            });
        }
    });
    format!("ws://127.0.0.1:{}", addr.port())
}

async fn spawn_app(state: Arc<AppState>) -> String {
    let app = Router::new()
        .merge(create_api_router())
        .merge(create_relay_router())
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("127.0.0.1:{}", addr.port())
}

type WsClient = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn next_reply(ws: &mut WsClient) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("reply before timeout")
            .expect("socket open")
            .expect("frame ok");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("json reply");
        }
    }
}

/// An unmatched question streams through the model: deltas flagged
/// not-last, then one empty end-of-turn token.
#[tokio::test]
async fn test_streamed_answer_deltas_then_final_empty_token() {
    let model_url = spawn_fake_model().await;
    let state = Arc::new(AppState::new(streaming_config(model_url)));
    let addr = spawn_app(state).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/relay"))
        .await
        .unwrap();

    ws.send(Message::Text(
        r#"{"type":"setup","callSid":"CA1"}"#.to_string().into(),
    ))
    .await
    .unwrap();

    // Give the gateway a beat to bring the model leg up
    tokio::time::sleep(Duration::from_millis(200)).await;

    ws.send(Message::Text(
        r#"{"type":"prompt","voicePrompt":"do you ever do wine nights"}"#
            .to_string()
            .into(),
    ))
    .await
    .unwrap();

    let d1 = next_reply(&mut ws).await;
    assert_eq!(d1["last"], false);
    assert_eq!(d1["token"], "We pour tastings ");

    let d2 = next_reply(&mut ws).await;
    assert_eq!(d2["last"], false);
    assert_eq!(d2["token"], "every Saturday.");

    let fin = next_reply(&mut ws).await;
    assert_eq!(fin["last"], true);
    assert_eq!(fin["token"], "");
}

/// A model endpoint that refuses connections degrades the call to
/// local-only: the caller gets an apology, never a hang.
#[tokio::test]
async fn test_unreachable_model_degrades_to_local_only() {
    // Grab a port with nothing listening on it
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_url = format!("ws://127.0.0.1:{}", dead.local_addr().unwrap().port());
    drop(dead);

    let state = Arc::new(AppState::new(streaming_config(dead_url)));
    let addr = spawn_app(state).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/relay"))
        .await
        .unwrap();

    ws.send(Message::Text(r#"{"type":"setup"}"#.to_string().into()))
        .await
        .unwrap();
    ws.send(Message::Text(
        r#"{"type":"prompt","voicePrompt":"what's your favorite color"}"#
            .to_string()
            .into(),
    ))
    .await
    .unwrap();

    let reply = next_reply(&mut ws).await;
    assert_eq!(reply["last"], true);
    assert!(
        reply["token"]
            .as_str()
            .unwrap_or_default()
            .to_lowercase()
            .contains("sorry")
    );

    // Local intents still work on the same call
    ws.send(Message::Text(
        r#"{"type":"prompt","voicePrompt":"are you open today"}"#
            .to_string()
            .into(),
    ))
    .await
    .unwrap();
    let hours = next_reply(&mut ws).await;
    assert!(hours["token"].as_str().unwrap_or_default().contains("open"));
}
