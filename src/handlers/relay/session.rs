//! Per-call session state machine.
//!
//! One `RelaySession` per relay connection, driven by a single task so
//! event ordering is structural. The session owns the caller-facing send
//! channel, the optional model leg, the schema-negotiation cursor, and the
//! streaming turn queue. Its one hard rule: a caller utterance that
//! reaches the `Active` phase always produces at least one outbound
//! message before the next utterance is processed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ModelTransport;
use crate::core::model::{CompletionClient, ModelEvent, RealtimeModelClient};
use crate::intent::{IntentMatch, classify, reply_for};
use crate::intent::{transfer_ack, transfer_fallback, unhandled_apology};
use crate::state::SessionInfo;
use crate::utils::sanitize_for_speech;

use super::messages::{
    OUTBOUND_SCHEMA_COUNT, RelayInboundMessage, RelayMessageRoute, is_schema_rejection,
    render_reply,
};

/// Bound on the realtime model handshake so setup never blocks the call.
const MODEL_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Session lifecycle phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Socket accepted, awaiting the setup handshake
    Connecting,
    /// Handshake received, ready to answer
    Active,
    /// Either side is closing
    Closing,
    /// Terminal
    Closed,
}

/// State machine for one call.
pub struct RelaySession {
    id: String,
    phase: Phase,
    call_sid: Option<String>,
    app_state: Arc<crate::state::AppState>,
    message_tx: mpsc::Sender<RelayMessageRoute>,

    /// Cursor into the outbound candidate-shape table; only ever advances
    schema_index: usize,
    /// Last rendered reply (text, last), kept for schema-rejection resends
    last_reply: Option<(String, bool)>,

    /// Store domain, cached for per-reply sanitization
    domain: String,

    // Streaming turn state
    turn_in_flight: bool,
    /// Non-final prompt fragments accumulated until the end-of-turn marker
    pending_fragments: String,
    /// Utterances that arrived while a model turn was in flight
    queued_utterances: VecDeque<String>,
    /// Partial answer tokens for the current model turn
    partial_answer: String,

    // Model leg
    completion: Option<CompletionClient>,
    realtime: Option<RealtimeModelClient>,
    model_events_tx: mpsc::Sender<ModelEvent>,
}

impl RelaySession {
    /// Create the session and its registry entry.
    pub fn new(
        id: String,
        app_state: Arc<crate::state::AppState>,
        message_tx: mpsc::Sender<RelayMessageRoute>,
        model_events_tx: mpsc::Sender<ModelEvent>,
    ) -> Self {
        app_state.sessions.insert(
            id.clone(),
            SessionInfo {
                call_sid: None,
                started_at: Instant::now(),
            },
        );

        let config = &app_state.config;
        let completion = match (config.model_transport, config.has_model()) {
            (ModelTransport::Completion, true) => CompletionClient::new(
                config.openai_api_key.clone().unwrap_or_default(),
                config.completion_model.clone(),
                config.completion_api_base.clone(),
                config.facts.system_prompt(),
            )
            .map_err(|e| warn!("completion client unavailable: {e}"))
            .ok(),
            _ => None,
        };

        let domain = config.facts.domain.clone();

        Self {
            id,
            phase: Phase::Connecting,
            call_sid: None,
            app_state,
            message_tx,
            schema_index: 0,
            last_reply: None,
            domain,
            turn_in_flight: false,
            pending_fragments: String::new(),
            queued_utterances: VecDeque::new(),
            partial_answer: String::new(),
            completion,
            realtime: None,
            model_events_tx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Handle one raw inbound frame.
    ///
    /// Malformed JSON is dropped here: logged, no reply, no error escapes.
    pub async fn handle_inbound(&mut self, raw: &str) {
        let message: RelayInboundMessage = match serde_json::from_str(raw) {
            Ok(m) => m,
            Err(e) => {
                warn!(session = %self.id, "dropping malformed relay event: {e}");
                return;
            }
        };

        match message {
            RelayInboundMessage::Setup {
                call_sid,
                session_id,
            } => self.on_setup(call_sid, session_id).await,
            RelayInboundMessage::Prompt { voice_prompt, last } => {
                self.on_prompt(voice_prompt, last).await
            }
            RelayInboundMessage::Interrupt {
                utterance_until_interrupt,
            } => {
                debug!(
                    session = %self.id,
                    heard = ?utterance_until_interrupt,
                    "caller interrupted playback"
                );
            }
            RelayInboundMessage::Dtmf { digit } => {
                debug!(session = %self.id, digit = ?digit, "dtmf received");
            }
            RelayInboundMessage::ProviderError { description } => {
                self.on_provider_error(description.unwrap_or_default()).await
            }
            RelayInboundMessage::Unknown => {
                debug!(session = %self.id, "ignoring unknown relay event kind");
            }
        }
    }

    /// Setup handshake: silently acknowledged, never answered with speech.
    async fn on_setup(&mut self, call_sid: Option<String>, session_id: Option<String>) {
        if self.phase != Phase::Connecting {
            debug!(session = %self.id, "duplicate setup ignored");
            return;
        }
        self.phase = Phase::Active;
        self.call_sid = call_sid.clone();

        if let Some(mut entry) = self.app_state.sessions.get_mut(&self.id) {
            entry.call_sid = call_sid.clone();
        }

        info!(
            session = %self.id,
            call_sid = ?call_sid,
            provider_session = ?session_id,
            "relay session active"
        );

        // Streaming transport: bring the model leg up for the whole call.
        // A failed connect degrades to local-only answers; the caller is
        // never left hanging on a model that will not come.
        let config = &self.app_state.config;
        if config.model_transport == ModelTransport::Realtime && config.has_model() {
            let client = RealtimeModelClient::new(
                config.openai_api_key.clone().unwrap_or_default(),
                config.realtime_model.clone(),
                config.facts.system_prompt(),
                config.realtime_api_url.clone(),
            );
            let connect = tokio::time::timeout(
                MODEL_CONNECT_TIMEOUT,
                client.connect(self.model_events_tx.clone()),
            )
            .await;
            match connect {
                Ok(Ok(())) => self.realtime = Some(client),
                Ok(Err(e)) => {
                    warn!(session = %self.id, "model socket connect failed, local-only: {e}")
                }
                Err(_) => {
                    warn!(session = %self.id, "model socket connect timed out, local-only")
                }
            }
        }
    }

    /// Prompt event. Fragments accumulate until the end-of-turn marker;
    /// a complete utterance always produces at least one reply.
    async fn on_prompt(&mut self, voice_prompt: String, last: bool) {
        if matches!(self.phase, Phase::Closing | Phase::Closed) {
            return;
        }
        if self.phase == Phase::Connecting {
            // Providers send setup first; tolerate the stray prompt rather
            // than drop a caller question on the floor
            warn!(session = %self.id, "prompt before setup");
            self.phase = Phase::Active;
        }

        if !last {
            self.pending_fragments.push_str(&voice_prompt);
            self.pending_fragments.push(' ');
            return;
        }

        let utterance = if self.pending_fragments.is_empty() {
            voice_prompt
        } else {
            let mut full = std::mem::take(&mut self.pending_fragments);
            full.push_str(&voice_prompt);
            full
        };

        if self.turn_in_flight {
            // Never interleave two in-flight model turns for one call;
            // drained in arrival order after the current turn completes
            debug!(session = %self.id, "queueing utterance behind in-flight turn");
            self.queued_utterances.push_back(utterance);
            return;
        }

        self.process_utterance(utterance).await;
    }

    /// Run one complete utterance through the intent pipeline.
    async fn process_utterance(&mut self, utterance: String) {
        let intent = classify(&utterance);
        debug!(session = %self.id, intent = ?intent, "utterance classified");

        if intent == IntentMatch::Transfer {
            self.handle_transfer().await;
            return;
        }

        let local_reply = {
            let snapshot = self.app_state.pricing.snapshot();
            reply_for(&intent, &snapshot, &self.app_state.config.facts)
        };

        if let Some(text) = local_reply {
            self.send_reply(&text, true).await;
            return;
        }

        // Nothing local matched: model fallback, then apology-of-last-resort
        if let Some(completion) = self.completion.clone() {
            match completion.ask(&utterance).await {
                Ok(reply) => self.send_reply(&reply, true).await,
                Err(e) => {
                    warn!(session = %self.id, "completion failed: {e}");
                    let fallback = self.app_state.config.facts.model_fallback_line();
                    self.send_reply(&fallback, true).await;
                }
            }
            return;
        }

        if let Some(realtime) = self.realtime.clone() {
            if realtime.is_ready() {
                match realtime.send_utterance(&utterance).await {
                    Ok(()) => {
                        self.turn_in_flight = true;
                        return;
                    }
                    Err(e) => {
                        warn!(session = %self.id, "model send failed: {e}");
                        let fallback = self.app_state.config.facts.model_fallback_line();
                        self.send_reply(&fallback, true).await;
                        return;
                    }
                }
            }
        }

        let apology = unhandled_apology(&self.app_state.config.facts);
        self.send_reply(&apology, true).await;
    }

    /// Transfer: acknowledge first, then redirect; a failed redirect gets
    /// the spoken fallback number instead of a silent stall.
    async fn handle_transfer(&mut self) {
        self.send_reply(&transfer_ack(), true).await;

        let transfer = self.app_state.transfer.clone();
        match (transfer, self.call_sid.clone()) {
            (Some(client), Some(call_sid)) => {
                if let Err(e) = client.redirect(&call_sid).await {
                    warn!(session = %self.id, "transfer failed: {e}");
                    let fallback = transfer_fallback(&self.app_state.config.facts);
                    self.send_reply(&fallback, true).await;
                }
            }
            _ => {
                let fallback = transfer_fallback(&self.app_state.config.facts);
                self.send_reply(&fallback, true).await;
            }
        }
    }

    /// Provider-reported error: schema rejections advance the candidate
    /// cursor and resend the last payload; everything else is logged.
    async fn on_provider_error(&mut self, description: String) {
        if is_schema_rejection(&description) {
            if self.schema_index + 1 < OUTBOUND_SCHEMA_COUNT {
                self.schema_index += 1;
                info!(
                    session = %self.id,
                    schema_index = self.schema_index,
                    "outbound shape rejected, advancing schema cursor"
                );
                if let Some((text, last)) = self.last_reply.clone() {
                    self.send_rendered(&text, last).await;
                }
            } else {
                warn!(
                    session = %self.id,
                    "outbound shape rejected but no candidates remain: {description}"
                );
            }
        } else {
            warn!(session = %self.id, "provider error: {description}");
        }
    }

    /// Events coming back from the realtime model leg.
    pub async fn handle_model_event(&mut self, event: ModelEvent) {
        match event {
            ModelEvent::Delta(token) => {
                if !self.turn_in_flight {
                    debug!(session = %self.id, "dropping stray model delta");
                    return;
                }
                self.partial_answer.push_str(&token);
                // Forward immediately so the caller hears the answer build
                self.send_reply(&token, false).await;
            }
            ModelEvent::TurnDone => {
                if self.turn_in_flight {
                    debug!(
                        session = %self.id,
                        chars = self.partial_answer.len(),
                        "model turn complete"
                    );
                    self.turn_in_flight = false;
                    self.partial_answer.clear();
                    // Empty token with the last flag terminates the turn
                    self.send_reply("", true).await;
                }
                self.drain_queue().await;
            }
            ModelEvent::Failed(err) => {
                warn!(session = %self.id, "model leg failed: {err}");
                if self.turn_in_flight {
                    self.turn_in_flight = false;
                    self.partial_answer.clear();
                    let fallback = self.app_state.config.facts.model_fallback_line();
                    self.send_reply(&fallback, true).await;
                }
                // A dead socket means local-only from here on; the caller
                // leg stays up because local answers remain possible
                let leg_dead = self.realtime.as_ref().is_some_and(|r| !r.is_ready());
                if leg_dead {
                    if let Some(realtime) = self.realtime.take() {
                        realtime.close().await;
                    }
                    info!(session = %self.id, "model leg closed, continuing local-only");
                }
                self.drain_queue().await;
            }
        }
    }

    /// Process utterances queued behind an in-flight turn, in order.
    async fn drain_queue(&mut self) {
        while !self.turn_in_flight {
            let Some(next) = self.queued_utterances.pop_front() else {
                break;
            };
            self.process_utterance(next).await;
        }
    }

    /// Sanitize and send one reply, remembering it for possible resend.
    async fn send_reply(&mut self, text: &str, last: bool) {
        let clean = sanitize_for_speech(text, &self.domain);
        self.send_rendered(&clean, last).await;
    }

    /// Send pre-sanitized text in the currently negotiated shape.
    async fn send_rendered(&mut self, text: &str, last: bool) {
        let payload = render_reply(text, last, self.schema_index);
        self.last_reply = Some((text.to_string(), last));
        if self
            .message_tx
            .send(RelayMessageRoute::Reply(payload))
            .await
            .is_err()
        {
            debug!(session = %self.id, "caller socket gone, reply dropped");
        }
    }

    /// Tear the session down: close the paired model leg and release the
    /// registry entry. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        self.phase = Phase::Closing;

        if let Some(realtime) = self.realtime.take() {
            realtime.close().await;
        }
        self.app_state.sessions.remove(&self.id);
        self.phase = Phase::Closed;
        info!(session = %self.id, "relay session closed");
    }
}
