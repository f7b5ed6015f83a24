//! Relay WebSocket handler.
//!
//! Upgrades the relay provider's connection and drives one
//! [`RelaySession`] per call: a sender task serializes outbound replies,
//! and a single event loop feeds inbound frames and model-leg events into
//! the session so ordering is structural, not relied upon.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::{select, time::Duration};
use tracing::{debug, info, warn};

use crate::core::model::ModelEvent;
use crate::state::AppState;

use super::messages::RelayMessageRoute;
use super::session::RelaySession;

/// Channel buffer for outbound replies.
const CHANNEL_BUFFER_SIZE: usize = 64;

/// How often the loop checks for a stale connection.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum idle time before closing the connection.
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Relay WebSocket handler.
///
/// # Arguments
/// * `ws` - The WebSocket upgrade request from Axum
/// * `state` - Application state (pricing, registry, collaborators)
///
/// # Returns
/// * `Response` - HTTP response that upgrades the connection to WebSocket
pub async fn relay_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("relay connection upgrade requested");
    ws.on_upgrade(move |socket| handle_relay_socket(socket, state))
}

/// Drive one relay connection to completion.
async fn handle_relay_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let session_id = uuid::Uuid::new_v4().to_string();
    info!(session = %session_id, "relay connection established");

    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<RelayMessageRoute>(CHANNEL_BUFFER_SIZE);
    let (model_tx, mut model_rx) = mpsc::channel::<ModelEvent>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages
    let sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let result = match route {
                RelayMessageRoute::Reply(payload) => match serde_json::to_string(&payload) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        warn!("failed to serialize outgoing reply: {e}");
                        continue;
                    }
                },
                RelayMessageRoute::Close => {
                    debug!("closing relay socket");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                warn!("failed to send relay message: {e}");
                break;
            }
        }
    });

    let mut session = RelaySession::new(
        session_id.clone(),
        app_state,
        message_tx.clone(),
        model_tx,
    );

    let mut last_activity = std::time::Instant::now();

    loop {
        select! {
            msg_result = receiver.next() => {
                last_activity = std::time::Instant::now();

                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        session.handle_inbound(&text).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(session = %session_id, "relay closed by provider");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary/ping/pong frames carry nothing for us
                    }
                    Some(Err(e)) => {
                        warn!(session = %session_id, "relay socket error: {e}");
                        break;
                    }
                    None => {
                        info!(session = %session_id, "relay connection ended");
                        break;
                    }
                }
            }
            Some(event) = model_rx.recv() => {
                session.handle_model_event(event).await;
            }
            _ = tokio::time::sleep(IDLE_CHECK_INTERVAL) => {
                if last_activity.elapsed() > IDLE_TIMEOUT {
                    warn!(
                        session = %session_id,
                        idle_secs = last_activity.elapsed().as_secs(),
                        "closing stale relay connection"
                    );
                    break;
                }
            }
        }
    }

    // Cleanup: closing either side closes both. The Close route makes the
    // sender task flush and exit on its own.
    let _ = message_tx.send(RelayMessageRoute::Close).await;
    session.shutdown().await;
    let _ = sender_task.await;

    info!(session = %session_id, "relay connection terminated");
}
