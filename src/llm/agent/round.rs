//! The bounded stream / tool / stream loop.
//!
//! A [`RoundController`] drives one turn. Round `r` first executes the tool
//! calls left pending by round `r - 1`, then streams a new completion over
//! the whole message list. Rounds `0..L` offer tools; round `L` is a forced
//! final attempt without them, so a turn issues at most `L + 1` requests.
//!
//! Break requests are honoured at safe points only: after a streamed text
//! delta that completes a line, and at round boundaries.

use std::sync::Arc;

use futures_util::StreamExt;
use tracing::Instrument;

use super::accumulator::ToolCallAccumulator;
use super::executor::{ToolExecutor, ToolOutcome};
use super::types::{RoundState, StopReason, TurnOutcome};
use crate::llm::error::LlmError;
use crate::llm::provider::ChatBackend;
use crate::llm::providers::message::{Message, ToolCall};
use crate::llm::tools::{ToolContext, ToolKind};
use crate::llm::types::{ChatRequest, ToolChoice, ToolDefinition};
use crate::llm::usage::TokenUsage;
use crate::session::{AnswerId, SessionStatus};

/// Receives side effects of a running turn.
///
/// Every method has an empty default so observers implement only what they
/// need.
#[allow(unused_variables)]
pub trait RoundObserver: Send {
    fn round_started(&mut self, round: &RoundState) {}
    /// Newly arrived answer text; `round.text` already includes it.
    fn text_delta(&mut self, round: &RoundState, delta: &str) {}
    fn reasoning_delta(&mut self, round: &RoundState, delta: &str) {}
    fn usage(&mut self, usage: &TokenUsage) {}
    /// Called right before a tool executes.
    fn tool_call(&mut self, kind: Option<ToolKind>, call: &ToolCall) {}
    fn tool_result(&mut self, call: &ToolCall, outcome: &ToolOutcome) {}
    fn round_finished(&mut self, round: &RoundState) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RoundObserver for NoopObserver {}

/// Drives stream/tool rounds for one turn at a time.
pub struct RoundController {
    backend: Arc<dyn ChatBackend>,
    executor: ToolExecutor,
    model: String,
    round_limit: u32,
    tool_choice: ToolChoice,
    definitions: Vec<ToolDefinition>,
}

impl RoundController {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        executor: ToolExecutor,
        model: impl Into<String>,
        round_limit: u32,
        tool_choice: ToolChoice,
    ) -> Self {
        let definitions = executor.registry().definitions(executor.config());
        Self {
            backend,
            executor,
            model: model.into(),
            round_limit,
            tool_choice,
            definitions,
        }
    }

    pub fn round_limit(&self) -> u32 {
        self.round_limit
    }

    /// Tool definitions offered on non-final rounds.
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Run one turn over `messages`, appending what the turn produces.
    ///
    /// On return `messages` holds the assistant tool-call messages, the tool
    /// results in call order, and the final assistant text if any.
    ///
    /// # Errors
    ///
    /// Returns the backend error that aborted the turn. Tool failures never
    /// abort a turn.
    pub async fn run(
        &self,
        session: &SessionStatus,
        answer_id: AnswerId,
        ctx: &ToolContext,
        messages: &mut Vec<Message>,
        observer: &mut dyn RoundObserver,
    ) -> Result<TurnOutcome, LlmError> {
        let mut usage = TokenUsage::default();
        let mut pending: Vec<ToolCall> = Vec::new();
        let mut rounds = 0;

        let interrupted = |text: String, usage: TokenUsage, rounds: u32| TurnOutcome {
            text,
            stop: StopReason::Interrupted,
            usage,
            rounds,
        };

        for round in 0..=self.round_limit {
            if session.is_break_requested(answer_id) {
                tracing::info!(%answer_id, round, "turn interrupted at round boundary");
                return Ok(interrupted(String::new(), usage, rounds));
            }

            if !pending.is_empty() {
                self.run_tools(std::mem::take(&mut pending), ctx, messages, observer)
                    .await;
                if session.is_break_requested(answer_id) {
                    tracing::info!(%answer_id, round, "turn interrupted after tools");
                    return Ok(interrupted(String::new(), usage, rounds));
                }
            }

            let offer_tools = round < self.round_limit;
            let mut request = ChatRequest::new(&self.model, messages.clone());
            if offer_tools {
                request = request.with_tools(self.definitions.clone(), self.tool_choice);
            }

            let mut state = RoundState::new(round, session.next_speak_index());
            observer.round_started(&state);
            rounds += 1;

            let span = tracing::info_span!(
                "round",
                round,
                speak_index = state.speak_index,
                tools = request.has_tools()
            );
            let (acc, broke) = self
                .stream_round(session, answer_id, &request, &mut state, &mut usage, observer)
                .instrument(span)
                .await?;
            if broke {
                tracing::info!(%answer_id, round, "turn interrupted mid-stream");
                messages.push(Message::assistant(state.text.clone()));
                return Ok(interrupted(state.text, usage, rounds));
            }

            if !state.has_text() {
                state.pending_tool_calls = acc.into_calls();
            } else if !acc.is_empty() {
                tracing::debug!(discarded = acc.len(), "round produced text, dropping tool calls");
            }
            observer.round_finished(&state);

            if state.has_text() {
                tracing::debug!(round, chars = state.text.len(), "round produced answer");
                messages.push(Message::assistant(state.text.clone()));
                return Ok(TurnOutcome {
                    text: state.text,
                    stop: StopReason::Done,
                    usage,
                    rounds,
                });
            }
            pending = state.pending_tool_calls;
            tracing::debug!(round, tool_calls = pending.len(), "round produced no text");
        }

        tracing::warn!(rounds, "round budget exhausted without an answer");
        Ok(TurnOutcome {
            text: String::new(),
            stop: StopReason::Exhausted,
            usage,
            rounds,
        })
    }

    /// Consume one completion. Returns the round's tool-call fragments and
    /// whether a break was observed at a line boundary.
    async fn stream_round(
        &self,
        session: &SessionStatus,
        answer_id: AnswerId,
        request: &ChatRequest,
        state: &mut RoundState,
        usage: &mut TokenUsage,
        observer: &mut dyn RoundObserver,
    ) -> Result<(ToolCallAccumulator, bool), LlmError> {
        let mut stream = self.backend.stream(request).await?;
        let mut acc = ToolCallAccumulator::new();
        while let Some(item) = stream.next().await {
            let event = item?;
            if let Some(reasoning) = event.reasoning.as_deref().filter(|r| !r.is_empty()) {
                observer.reasoning_delta(state, reasoning);
            }
            if let Some(text) = event.text.as_deref().filter(|t| !t.is_empty()) {
                state.text.push_str(text);
                observer.text_delta(state, text);
                if text.contains('\n') && session.is_break_requested(answer_id) {
                    return Ok((acc, true));
                }
            }
            for delta in &event.tool_call_deltas {
                acc.merge(delta);
            }
            if let Some(u) = &event.usage {
                usage.add(u);
                observer.usage(u);
            }
            if event.is_terminal {
                break;
            }
        }
        Ok((acc, false))
    }

    async fn run_tools(
        &self,
        calls: Vec<ToolCall>,
        ctx: &ToolContext,
        messages: &mut Vec<Message>,
        observer: &mut dyn RoundObserver,
    ) {
        tracing::info!(
            "executing {} tool calls: {:?}",
            calls.len(),
            calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );
        messages.push(Message::assistant_with_tool_calls(calls.clone()));
        for call in &calls {
            observer.tool_call(ToolKind::from_wire_name(&call.name), call);
            let outcome = self.executor.execute(call, ctx).await;
            observer.tool_result(call, &outcome);
            messages.push(Message::tool_result(&call.id, outcome.content));
        }
    }
}
