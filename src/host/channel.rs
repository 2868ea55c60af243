//! Host command channel and router.
//!
//! The client validates envelopes and forwards them over an mpsc channel;
//! the server decodes each one into a [`HostCommand`], applies it through a
//! [`HostCommandHandler`] and answers on a oneshot.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::host::contract::{CommandEnvelope, EventEnvelope, HostCommand, ResponseEnvelope};
use crate::pipeline::coordinator::ConversationCoordinator;
use crate::pipeline::messages::TurnTrigger;
use crate::session::{AnswerId, SessionSnapshot};

/// What the host bridge can ask of the engine.
pub trait HostCommandHandler: Send + Sync + 'static {
    /// Start a text turn. Returns once the turn is scheduled, not finished.
    fn send_prompt(&self, text: &str) -> Result<()>;
    fn break_answer(&self) -> Option<AnswerId>;
    fn set_audio_enabled(&self, on: bool);
    fn set_listening(&self, on: bool);
    fn set_live_mode(&self, on: bool);
    fn snapshot(&self) -> SessionSnapshot;
    /// Called when the host asks the runtime to stop.
    fn request_stop(&self) {}
}

impl HostCommandHandler for Arc<ConversationCoordinator> {
    fn send_prompt(&self, text: &str) -> Result<()> {
        let coordinator = Arc::clone(self);
        let text = text.to_owned();
        tokio::spawn(async move {
            // Failures are broadcast as runtime events by the coordinator.
            if let Err(e) = coordinator.start_turn(&text, TurnTrigger::Text).await {
                debug!("host prompt turn failed: {e}");
            }
        });
        Ok(())
    }

    fn break_answer(&self) -> Option<AnswerId> {
        ConversationCoordinator::break_answer(self)
    }

    fn set_audio_enabled(&self, on: bool) {
        self.session().set_audio_enabled(on);
    }

    fn set_listening(&self, on: bool) {
        self.session().set_listening(on);
    }

    fn set_live_mode(&self, on: bool) {
        self.session().set_live_mode(on);
    }

    fn snapshot(&self) -> SessionSnapshot {
        self.session().snapshot()
    }
}

struct HostCommandRequest {
    envelope: CommandEnvelope,
    response_tx: oneshot::Sender<Result<ResponseEnvelope>>,
}

#[derive(Clone)]
pub struct HostCommandClient {
    request_tx: mpsc::Sender<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
}

impl HostCommandClient {
    pub async fn send(&self, envelope: CommandEnvelope) -> Result<ResponseEnvelope> {
        if let Err(e) = envelope.validate() {
            return Ok(ResponseEnvelope::error(envelope.request_id, e.to_string()));
        }

        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(HostCommandRequest {
                envelope,
                response_tx,
            })
            .await
            .map_err(|e| {
                EngineError::Channel(format!("failed to send host command request: {e}"))
            })?;

        response_rx
            .await
            .map_err(|e| EngineError::Channel(format!("host command response dropped: {e}")))?
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.event_tx.subscribe()
    }
}

pub struct HostCommandServer<H: HostCommandHandler> {
    request_rx: mpsc::Receiver<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
    handler: H,
}

#[must_use]
pub fn command_channel<H: HostCommandHandler>(
    request_capacity: usize,
    event_capacity: usize,
    handler: H,
) -> (HostCommandClient, HostCommandServer<H>) {
    let (event_tx, _event_rx) = broadcast::channel(event_capacity.max(1));
    command_channel_with_events(request_capacity, event_tx, handler)
}

/// Create a command channel that publishes on an existing event sender, so
/// engine events and command acknowledgements share one stream.
#[must_use]
pub fn command_channel_with_events<H: HostCommandHandler>(
    request_capacity: usize,
    event_tx: broadcast::Sender<EventEnvelope>,
    handler: H,
) -> (HostCommandClient, HostCommandServer<H>) {
    let (request_tx, request_rx) = mpsc::channel(request_capacity.max(1));
    (
        HostCommandClient {
            request_tx,
            event_tx: event_tx.clone(),
        },
        HostCommandServer {
            request_rx,
            event_tx,
            handler,
        },
    )
}

impl<H: HostCommandHandler> HostCommandServer<H> {
    pub async fn run(mut self) {
        while let Some(request) = self.request_rx.recv().await {
            let response = self.route(&request.envelope);
            let _ = request.response_tx.send(response);
        }
    }

    /// Apply one command envelope.
    pub fn route(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let request_id = envelope.request_id.clone();
        let command = match HostCommand::from_envelope(envelope) {
            Ok(command) => command,
            Err(e) => {
                warn!(%request_id, command = envelope.command.as_str(), "rejected: {e}");
                return Ok(ResponseEnvelope::error(request_id, e.to_string()));
            }
        };
        debug!(%request_id, ?command, "host command");

        let payload = match command {
            HostCommand::Ping => json!({"pong": true}),
            HostCommand::SendPrompt { text } => {
                self.handler.send_prompt(&text)?;
                json!({"accepted": true})
            }
            HostCommand::BreakAnswer => {
                let interrupted = self.handler.break_answer();
                if let Some(answer_id) = interrupted {
                    self.emit_event(
                        "conversation.interrupted",
                        json!({"request_id": request_id, "answer_id": answer_id}),
                    );
                }
                json!({"accepted": true, "answer_id": interrupted})
            }
            HostCommand::ToggleAudio { on } => {
                let on = on.unwrap_or(!self.handler.snapshot().is_audio_enabled);
                self.handler.set_audio_enabled(on);
                self.toggled("audio.toggled", &request_id, on)
            }
            HostCommand::ToggleListening { on } => {
                let on = on.unwrap_or(!self.handler.snapshot().is_listening);
                self.handler.set_listening(on);
                self.toggled("listening.toggled", &request_id, on)
            }
            HostCommand::ToggleLiveMode { on } => {
                let on = on.unwrap_or(!self.handler.snapshot().is_live_mode);
                self.handler.set_live_mode(on);
                self.toggled("live_mode.toggled", &request_id, on)
            }
            HostCommand::Status => serde_json::to_value(self.handler.snapshot())
                .map_err(|e| EngineError::Channel(format!("failed to encode status: {e}")))?,
            HostCommand::Stop => {
                self.handler.request_stop();
                json!({"accepted": true})
            }
        };
        Ok(ResponseEnvelope::ok(request_id, payload))
    }

    fn toggled(&self, event: &str, request_id: &str, on: bool) -> serde_json::Value {
        self.emit_event(event, json!({"request_id": request_id, "on": on}));
        json!({"accepted": true, "on": on})
    }

    fn emit_event(&self, event: &str, payload: serde_json::Value) {
        let envelope = EventEnvelope::new(uuid::Uuid::new_v4().to_string(), event, payload);
        let _ = self.event_tx.send(envelope);
    }
}
