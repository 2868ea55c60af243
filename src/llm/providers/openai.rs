//! OpenAI-compatible chat completions backend.
//!
//! Posts to `{base_url}/chat/completions` with `stream: true` and normalizes
//! the SSE delta chunks into [`StreamEvent`]s. Any server speaking the same
//! dialect (vLLM, Ollama, llama.cpp server, hosted proxies) works.
//!
//! # Examples
//!
//! ```rust,no_run
//! use parley::llm::provider::ChatBackend;
//! use parley::llm::providers::message::Message;
//! use parley::llm::providers::openai::{OpenAiAdapter, OpenAiConfig};
//! use parley::llm::types::ChatRequest;
//!
//! # async fn example() -> Result<(), parley::llm::error::LlmError> {
//! let adapter = OpenAiAdapter::new(OpenAiConfig::new("sk-..."))?;
//! let request = ChatRequest::new("gpt-4o-mini", vec![Message::user("Hello")]);
//! let stream = adapter.stream(&request).await?;
//! # drop(stream);
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::llm::error::LlmError;
use crate::llm::events::{FinishReason, StreamEvent, ToolCallDelta};
use crate::llm::provider::{ChatBackend, ChatEventStream};
use crate::llm::providers::sse::SseLineParser;
use crate::llm::types::ChatRequest;
use crate::llm::usage::TokenUsage;

// ── Configuration ─────────────────────────────────────────────

/// Default endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for the OpenAI-compatible adapter.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Bearer token; omitted from the request when empty.
    pub api_key: String,
    /// Endpoint root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Whole-request timeout enforced by the HTTP client.
    pub request_timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            request_timeout: Duration::from_secs(40),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

// ── Request Builder ───────────────────────────────────────────

/// Build the JSON body of a streamed chat completions request.
///
/// `tools` and `tool_choice` are only present when tools are offered.
pub fn build_request_body(request: &ChatRequest) -> serde_json::Value {
    let messages: Vec<serde_json::Value> =
        request.messages.iter().map(|m| m.to_openai()).collect();
    let mut body = serde_json::json!({
        "model": request.model,
        "messages": messages,
        "stream": true,
        "stream_options": { "include_usage": true },
    });

    if let Some(tools) = request.tools.as_ref().filter(|t| !t.is_empty())
        && let Some(obj) = body.as_object_mut()
    {
        let tools_json: Vec<serde_json::Value> = tools.iter().map(|t| t.to_openai()).collect();
        obj.insert("tools".into(), serde_json::Value::Array(tools_json));
        if let Some(choice) = request.tool_choice {
            obj.insert("tool_choice".into(), choice.as_str().into());
        }
    }

    body
}

// ── Chunk Parsing ─────────────────────────────────────────────

/// What a single `data:` payload contributed to the stream.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedChunk {
    /// Payload fields carried by the chunk (may be empty).
    pub event: StreamEvent,
    /// Finish reason reported by the chunk.
    pub finish_reason: Option<FinishReason>,
}

/// Parse one chat completions chunk.
///
/// Malformed JSON yields an empty chunk; an `error` object yields a
/// provider error.
pub fn parse_chunk(data: &str) -> Result<ParsedChunk, LlmError> {
    let parsed: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("skipping malformed stream chunk: {e}");
            return Ok(ParsedChunk::default());
        }
    };

    if let Some(err) = parsed.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .unwrap_or_else(|| err.to_string());
        return Err(LlmError::ProviderError(message));
    }

    let mut chunk = ParsedChunk::default();
    chunk.event.usage = parsed.get("usage").and_then(TokenUsage::from_openai);

    let Some(choice) = parsed
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    else {
        return Ok(chunk);
    };

    if let Some(delta) = choice.get("delta") {
        chunk.event.text = non_empty_str(delta.get("content"));
        chunk.event.reasoning = non_empty_str(delta.get("reasoning_content"));

        if let Some(calls) = delta.get("tool_calls").and_then(|tc| tc.as_array()) {
            for tc in calls {
                let function = tc.get("function");
                chunk.event.tool_call_deltas.push(ToolCallDelta {
                    index: tc
                        .get("index")
                        .and_then(|i| i.as_u64())
                        .and_then(|i| u32::try_from(i).ok())
                        .unwrap_or(0),
                    id: non_empty_str(tc.get("id")),
                    kind: non_empty_str(tc.get("type")),
                    name: non_empty_str(function.and_then(|f| f.get("name"))),
                    args_fragment: function
                        .and_then(|f| f.get("arguments"))
                        .and_then(|a| a.as_str())
                        .map(String::from),
                });
            }
        }
    }

    chunk.finish_reason = choice
        .get("finish_reason")
        .and_then(|f| f.as_str())
        .or_else(|| {
            choice
                .get("delta")
                .and_then(|d| d.get("finish_reason"))
                .and_then(|f| f.as_str())
        })
        .map(FinishReason::from_wire);

    Ok(chunk)
}

fn non_empty_str(value: Option<&serde_json::Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

// ── Adapter ───────────────────────────────────────────────────

/// OpenAI-compatible streaming adapter.
pub struct OpenAiAdapter {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("base_url", &self.config.base_url)
            .field("request_timeout", &self.config.request_timeout)
            .finish()
    }
}

impl OpenAiAdapter {
    /// Create an adapter; fails only if the HTTP client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LlmError::ConfigError(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn map_http_error(status: reqwest::StatusCode, body: &str) -> LlmError {
        let message = extract_error_message(body);
        match status.as_u16() {
            401 => LlmError::AuthError(format!("authentication failed: {message}")),
            429 => LlmError::RequestError(format!("rate limited: {message}")),
            code => LlmError::ProviderError(format!("HTTP {code}: {message}")),
        }
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl ChatBackend for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChatEventStream, LlmError> {
        let url = self.config.completions_url();
        let body = build_request_body(request);
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "sending chat request"
        );

        let mut builder = self.client.post(&url).json(&body);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::from_transport("chat request failed", &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::map_http_error(status, &text));
        }

        Ok(Box::pin(event_stream(response.bytes_stream())))
    }
}

// ── Event Stream ──────────────────────────────────────────────

struct StreamState {
    bytes: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    parser: SseLineParser,
    queue: VecDeque<Result<StreamEvent, LlmError>>,
    finish_reason: Option<FinishReason>,
    trailing_usage: Option<TokenUsage>,
    ended: bool,
}

impl StreamState {
    /// Route one SSE payload. Returns `true` when the stream is complete.
    fn on_data(&mut self, data: &str) -> bool {
        if data.trim() == "[DONE]" {
            self.finish();
            return true;
        }
        let chunk = match parse_chunk(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.queue.push_back(Err(e));
                return true;
            }
        };

        if self.finish_reason.is_some() {
            // Only usage is honoured after the finish chunk.
            if let Some(usage) = chunk.event.usage {
                self.trailing_usage = Some(usage);
            }
            return false;
        }

        let mut event = chunk.event;
        if chunk.finish_reason.is_some() {
            // Usage on the finish chunk itself travels with the terminal event.
            self.trailing_usage = event.usage.take();
            self.finish_reason = chunk.finish_reason;
        }
        if !event.is_empty() {
            self.queue.push_back(Ok(event));
        }
        false
    }

    fn finish(&mut self) {
        self.queue.push_back(Ok(StreamEvent {
            usage: self.trailing_usage.take(),
            is_terminal: true,
            finish_reason: self.finish_reason,
            ..StreamEvent::default()
        }));
    }
}

/// Normalize a raw SSE byte stream into chat events.
pub(crate) fn event_stream(
    bytes: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = Result<StreamEvent, LlmError>> + Send {
    futures_util::stream::unfold(
        StreamState {
            bytes: Box::pin(bytes),
            parser: SseLineParser::new(),
            queue: VecDeque::new(),
            finish_reason: None,
            trailing_usage: None,
            ended: false,
        },
        |mut state| async move {
            loop {
                if let Some(item) = state.queue.pop_front() {
                    if item.is_err() {
                        state.queue.clear();
                        state.ended = true;
                    }
                    return Some((item, state));
                }
                if state.ended {
                    return None;
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        for sse in state.parser.push(&chunk) {
                            if state.on_data(&sse.data) {
                                state.ended = true;
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        state.ended = true;
                        if state.finish_reason.is_some() {
                            tracing::debug!("transport closed after finish: {e}");
                            state.finish();
                        } else {
                            state.queue.push_back(Err(LlmError::StreamError(format!(
                                "stream read error: {e}"
                            ))));
                        }
                    }
                    None => {
                        state.ended = true;
                        let done = match state.parser.flush() {
                            Some(sse) => state.on_data(&sse.data),
                            None => false,
                        };
                        if !done {
                            state.finish();
                        }
                    }
                }
            }
        },
    )
}
