//! Conversation coordinator: wires prompts, the round controller, speech and
//! the voice capture loop together.
//!
//! One turn runs at a time. A new prompt first asks the in-flight turn to
//! break, then waits for the turn lock. A prompt that is superseded by a
//! newer one while it waits never reaches the backend. Each turn:
//!
//! 1. assembles the prompt (system, greeting, history window, prompt),
//! 2. runs the [`RoundController`] with a [`TurnObserver`] that streams UI
//!    updates and feeds the speech segmenter,
//! 3. closes speech with an end marker, persists history and remembers the
//!    answer.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::messages::{SpeakItem, TurnTrigger};
use super::segmenter::SpeechSegmenter;
use super::speak_queue::SpeakQueue;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::history::{HistoryChannel, HistoryStore, InMemoryHistoryStore, JsonHistoryStore};
use crate::llm::agent::{
    RoundController, RoundObserver, RoundState, StopReason, ToolExecutor, ToolOutcome,
    TurnOutcome,
};
use crate::llm::provider::ChatBackend;
use crate::llm::providers::message::{Message, ToolCall};
use crate::llm::providers::openai::{OpenAiAdapter, OpenAiConfig};
use crate::llm::tools::{ToolContext, ToolKind, ToolRegistry, register_builtins};
use crate::llm::usage::TokenUsage;
use crate::memory::{JsonlMemoryBackend, MemoryStore, open_best_effort, remember_best_effort};
use crate::runtime::{MessageLog, RuntimeEvent, UiMessage};
use crate::session::{AnswerId, RecordState, SessionStatus};
use crate::stt::VoiceInput;

/// Runtime event channel capacity.
pub const EVENT_CAPACITY: usize = 256;

/// Collaborators the coordinator does not build itself.
pub struct CoordinatorParts {
    pub backend: Arc<dyn ChatBackend>,
    pub registry: Arc<ToolRegistry>,
    pub history: Arc<dyn HistoryStore>,
    pub memory: Option<Arc<dyn MemoryStore>>,
    pub voice: Option<Arc<dyn VoiceInput>>,
    pub log: Option<MessageLog>,
}

impl CoordinatorParts {
    /// Build the default collaborators from configuration: the OpenAI
    /// adapter, built-in tools, the JSON history file and the JSONL memory.
    ///
    /// Memory and the message log are best-effort; the engine runs without
    /// them when they cannot be opened.
    pub async fn from_config(config: &EngineConfig) -> Result<Self> {
        let llm = OpenAiConfig::new(config.llm.effective_api_key())
            .with_base_url(&config.llm.base_url)
            .with_timeout(config.llm.request_timeout());
        let backend: Arc<dyn ChatBackend> = Arc::new(OpenAiAdapter::new(llm)?);

        let client = reqwest::Client::builder()
            .timeout(config.tools.timeout())
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build tool HTTP client: {e}")))?;
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry, &config.tools, client);

        let history: Arc<dyn HistoryStore> = match &config.history.path {
            Some(path) => Arc::new(JsonHistoryStore::open(path, config.history.store_limit).await?),
            None => Arc::new(InMemoryHistoryStore::new(config.history.store_limit)),
        };

        let memory = match config.memory.resolved_path() {
            Some(path) if config.memory.enabled => {
                open_best_effort(&JsonlMemoryBackend::new(path)).await
            }
            _ => None,
        };

        let log = config.host.log_dir.as_deref().and_then(|dir| {
            MessageLog::create(dir)
                .inspect_err(|e| warn!("message log disabled: {e}"))
                .ok()
        });

        Ok(Self {
            backend,
            registry: Arc::new(registry),
            history,
            memory,
            voice: None,
            log,
        })
    }

    pub fn with_voice(mut self, voice: Arc<dyn VoiceInput>) -> Self {
        self.voice = Some(voice);
        self
    }
}

pub struct ConversationCoordinator {
    config: EngineConfig,
    session: Arc<SessionStatus>,
    queue: Arc<SpeakQueue>,
    controller: RoundController,
    history: Arc<dyn HistoryStore>,
    memory: Option<Arc<dyn MemoryStore>>,
    voice: Option<Arc<dyn VoiceInput>>,
    tool_ctx: ToolContext,
    events: broadcast::Sender<RuntimeEvent>,
    log: Option<MessageLog>,
    turn_lock: tokio::sync::Mutex<()>,
}

impl ConversationCoordinator {
    pub fn new(
        config: EngineConfig,
        session: Arc<SessionStatus>,
        queue: Arc<SpeakQueue>,
        parts: CoordinatorParts,
    ) -> Self {
        let executor = ToolExecutor::new(parts.registry, config.tools.clone());
        let controller = RoundController::new(
            parts.backend,
            executor,
            config.llm.model.clone(),
            u32::try_from(config.llm.round_limit).unwrap_or(u32::MAX),
            config.llm.tool_choice,
        );
        let tool_ctx = ToolContext {
            search_result_limit: config.tools.search_result_limit,
            web_page_content_limit: config.tools.web_page_content_limit,
            ai_name: config.identity.ai_name.clone(),
            storage_dir: config.tools.resolved_storage_dir(),
            memory: parts.memory.clone(),
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        info!(
            model = %config.llm.model,
            round_limit = config.llm.round_limit,
            tools = controller.definitions().len(),
            memory = parts.memory.is_some(),
            "conversation coordinator ready"
        );
        Self {
            config,
            session,
            queue,
            controller,
            history: parts.history,
            memory: parts.memory,
            voice: parts.voice,
            tool_ctx,
            events,
            log: parts.log,
            turn_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> &Arc<SessionStatus> {
        &self.session
    }

    pub fn queue(&self) -> &Arc<SpeakQueue> {
        &self.queue
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn emit(&self, event: RuntimeEvent) {
        let _ = self.events.send(event);
    }

    /// Broadcast a UI message and append it to the message log.
    fn emit_logged(&self, message: UiMessage) {
        if let Some(log) = &self.log
            && let Err(e) = log.append(&message)
        {
            warn!("failed to write message log: {e}");
        }
        self.emit(RuntimeEvent::Message(message));
    }

    fn history_channel(&self) -> HistoryChannel {
        if self.session.is_live_mode() {
            HistoryChannel::Live
        } else {
            HistoryChannel::Chat
        }
    }

    /// Prompt layout: system prompt, introduction, greeting, history window,
    /// then the new prompt.
    async fn assemble_messages(&self, channel: HistoryChannel, prompt: &str) -> Vec<Message> {
        let identity = &self.config.identity;
        let mut messages = vec![
            Message::system(identity.system_prompt.as_str()),
            Message::user(format!("My name is {}", identity.admin_name)),
            Message::assistant(format!("Hello, {}", identity.admin_name)),
        ];
        match self
            .history
            .recent(channel, self.config.history.prompt_window)
            .await
        {
            Ok(window) => messages.extend(window),
            Err(e) => warn!("history unavailable for this turn: {e}"),
        }
        messages.push(Message::user(prompt));
        messages
    }

    // ── Turns ─────────────────────────────────────────────────

    /// Break the active answer, if any, and drop its queued speech.
    pub fn break_answer(&self) -> Option<AnswerId> {
        let id = self.session.break_active()?;
        let dropped = self.queue.discard_answer(id);
        info!(answer_id = %id, dropped, "answer interrupted");
        Some(id)
    }

    /// Run a turn for `prompt`, interrupting whatever turn is in flight.
    pub async fn start_turn(&self, prompt: &str, trigger: TurnTrigger) -> Result<TurnOutcome> {
        self.run_turn(AnswerId::new(), prompt, trigger).await
    }

    async fn run_turn(
        &self,
        answer_id: AnswerId,
        prompt: &str,
        trigger: TurnTrigger,
    ) -> Result<TurnOutcome> {
        self.session.request_answer(answer_id);
        self.break_answer();
        let _turn = self.turn_lock.lock().await;

        if self.session.is_superseded(answer_id) {
            info!(%answer_id, ?trigger, "prompt superseded before it started");
            if trigger == TurnTrigger::Voice {
                self.session.rearm_listening(answer_id);
            }
            let outcome = TurnOutcome {
                text: String::new(),
                stop: StopReason::Interrupted,
                usage: TokenUsage::default(),
                rounds: 0,
            };
            self.emit(RuntimeEvent::TurnFinished {
                answer_id,
                stop: outcome.stop,
                usage: outcome.usage,
                rounds: 0,
            });
            return Ok(outcome);
        }

        self.session.begin_answer(answer_id);
        let speak = self.session.is_audio_enabled();
        let channel = self.history_channel();
        info!(%answer_id, ?trigger, speak, ?channel, "turn started");
        self.emit(RuntimeEvent::TurnStarted { answer_id, trigger });

        let mut messages = self.assemble_messages(channel, prompt).await;
        let prompt_at = messages.len() - 1;

        let from = match trigger {
            TurnTrigger::Voice => format!("({})", self.config.identity.ai_name),
            TurnTrigger::Text => self.config.identity.ai_name.clone(),
        };
        let mut observer = TurnObserver::new(self, answer_id, from, speak);
        let result = self
            .controller
            .run(
                &self.session,
                answer_id,
                &self.tool_ctx,
                &mut messages,
                &mut observer,
            )
            .await;
        let last_speak_index = observer.last_speak_index;

        // Close the turn's speech so listening re-arms after the last paragraph.
        match (speak, last_speak_index) {
            (true, Some(index)) => {
                self.queue.push(SpeakItem::end_marker(index, answer_id));
            }
            _ if trigger == TurnTrigger::Voice => self.session.rearm_listening(answer_id),
            _ => {}
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%answer_id, "turn failed: {e}");
                self.emit_logged(
                    UiMessage::new(&observer.from, format!("Error: {e}")).for_answer(answer_id),
                );
                self.emit(RuntimeEvent::Error {
                    answer_id: Some(answer_id),
                    message: e.to_string(),
                });
                self.session.finish_answer(answer_id);
                return Err(e.into());
            }
        };

        observer.finish(&outcome);

        if let Err(e) = self.history.append(channel, &messages[prompt_at..]).await {
            warn!("failed to persist history: {e}");
        }
        remember_best_effort(self.memory.as_ref(), &outcome.text).await;

        info!(
            %answer_id,
            stop = ?outcome.stop,
            rounds = outcome.rounds,
            tokens = outcome.usage.total(),
            "turn finished"
        );
        self.emit(RuntimeEvent::TurnFinished {
            answer_id,
            stop: outcome.stop,
            usage: outcome.usage,
            rounds: outcome.rounds,
        });
        self.session.finish_answer(answer_id);
        Ok(outcome)
    }

    // ── Voice ─────────────────────────────────────────────────

    /// Capture utterances while listening is enabled, starting a voice turn
    /// for each one addressed to the assistant. Runs until `cancel` fires.
    pub async fn run_voice_loop(&self, cancel: CancellationToken) {
        let Some(voice) = self.voice.clone() else {
            debug!("no voice input attached; voice loop not started");
            return;
        };
        let ai_name = self.config.identity.ai_name.clone();
        info!(wake = %ai_name, "voice loop started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = self.session.wait_until_listening() => {}
            }

            self.session.set_record_state(RecordState::Recording);
            let heard = tokio::select! {
                () = cancel.cancelled() => break,
                heard = voice.listen() => heard,
            };
            let heard = match heard {
                Ok(text) => text,
                Err(e) => {
                    warn!("voice capture failed: {e}");
                    self.session.set_record_state(RecordState::Idle);
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(self.config.speech.poll_interval()) => {}
                    }
                    continue;
                }
            };
            if !self.session.is_listening() {
                continue;
            }
            let utterance = heard.trim();
            if !utterance.starts_with(ai_name.as_str()) {
                debug!(chars = utterance.chars().count(), "utterance without wake prefix ignored");
                continue;
            }

            self.session.set_record_state(RecordState::Processing);
            self.emit_logged(UiMessage::new(
                format!("({})", self.config.identity.admin_name),
                utterance,
            ));

            let answer_id = AnswerId::new();
            // Errors were already surfaced as UI events.
            let _ = self.run_turn(answer_id, utterance, TurnTrigger::Voice).await;
            self.session.set_record_state(RecordState::Idle);

            tokio::select! {
                () = cancel.cancelled() => break,
                () = self.session.wait_for_rearm(answer_id) => {}
            }
        }

        self.session.set_record_state(RecordState::Idle);
        info!("voice loop stopped");
    }
}

// ── Turn observer ─────────────────────────────────────────────

/// Turns round side effects into UI messages and speech items.
struct TurnObserver<'a> {
    coordinator: &'a ConversationCoordinator,
    answer_id: AnswerId,
    from: String,
    speak: bool,
    message_id: String,
    segmenter: Option<SpeechSegmenter>,
    last_speak_index: Option<u64>,
    usage: TokenUsage,
}

impl<'a> TurnObserver<'a> {
    fn new(
        coordinator: &'a ConversationCoordinator,
        answer_id: AnswerId,
        from: String,
        speak: bool,
    ) -> Self {
        Self {
            coordinator,
            answer_id,
            from,
            speak,
            message_id: String::new(),
            segmenter: None,
            last_speak_index: None,
            usage: TokenUsage::default(),
        }
    }

    fn message(&self, content: impl Into<String>) -> UiMessage {
        UiMessage::new(&self.from, content)
            .with_id(&self.message_id)
            .for_answer(self.answer_id)
    }

    fn enqueue(&self, item: Option<SpeakItem>) {
        if let Some(item) = item {
            debug!(speak_index = item.speak_index, "paragraph queued");
            self.coordinator.queue.push(item);
        }
    }

    /// Annotate the answer message with the turn's token count.
    fn finish(&self, outcome: &TurnOutcome) {
        if outcome.text.is_empty() {
            return;
        }
        let mut message = self.message(outcome.text.as_str());
        message.allow_break = false;
        message.token_count = Some(self.usage.total());
        self.coordinator.emit_logged(message);
    }
}

impl RoundObserver for TurnObserver<'_> {
    fn round_started(&mut self, round: &RoundState) {
        self.message_id = uuid::Uuid::new_v4().to_string();
        self.coordinator
            .emit(RuntimeEvent::Message(self.message("")));
        if self.speak {
            self.segmenter = Some(SpeechSegmenter::new(self.answer_id, round.speak_index));
            self.last_speak_index = Some(round.speak_index);
        }
    }

    fn text_delta(&mut self, round: &RoundState, delta: &str) {
        self.coordinator
            .emit(RuntimeEvent::Message(self.message(round.text.as_str())));
        let item = self.segmenter.as_mut().and_then(|s| s.push(delta));
        self.enqueue(item);
    }

    fn reasoning_delta(&mut self, round: &RoundState, delta: &str) {
        tracing::trace!(round = round.round_number, chars = delta.len(), "reasoning");
    }

    fn usage(&mut self, usage: &TokenUsage) {
        self.usage.add(usage);
    }

    fn tool_call(&mut self, kind: Option<ToolKind>, call: &ToolCall) {
        let ai_name = &self.coordinator.config.identity.ai_name;
        let notice = match kind {
            Some(kind) => {
                let args = call.parsed_args().unwrap_or_default();
                kind.action_text(ai_name, &args)
            }
            None => format!("{ai_name} tried an unknown tool: {}", call.name),
        };
        self.coordinator
            .emit_logged(UiMessage::new(&self.from, notice).for_answer(self.answer_id));
    }

    fn tool_result(&mut self, call: &ToolCall, outcome: &ToolOutcome) {
        debug!(
            tool_name = %call.name,
            success = outcome.success,
            chars = outcome.content.len(),
            "tool result"
        );
    }

    fn round_finished(&mut self, round: &RoundState) {
        let item = self.segmenter.take().and_then(|mut s| s.flush());
        self.enqueue(item);
        if !round.has_text() {
            self.coordinator
                .emit(RuntimeEvent::Message(UiMessage::revoke(&self.message_id)));
        }
    }
}
