//! LLM integration: streaming chat completions and the tool-calling loop.
//!
//! # Submodules
//!
//! - [`error`]: Error types with stable error codes
//! - [`types`]: Chat request and tool definition types
//! - [`events`]: Normalized streaming event model
//! - [`usage`]: Token usage accounting
//! - [`provider`]: The [`ChatBackend`] trait
//! - [`providers`]: Wire adapters (OpenAI-compatible SSE)
//! - [`tools`]: Tool catalog, registry and built-in handlers
//! - [`agent`]: Accumulator, executor and the round controller
//!
//! # Error Codes
//!
//! All errors carry a stable code (e.g. `CONFIG_INVALID`, `AUTH_FAILED`)
//! that is safe to match on programmatically.

pub mod agent;
pub mod error;
pub mod events;
pub mod provider;
pub mod providers;
pub mod tools;
pub mod types;
pub mod usage;

pub use agent::{RoundController, RoundObserver, StopReason, ToolExecutor, TurnOutcome};
pub use error::LlmError;
pub use events::{FinishReason, StreamEvent, ToolCallDelta};
pub use provider::{ChatBackend, ChatEventStream};
pub use providers::message::{Message, Role, ToolCall};
pub use providers::openai::{OpenAiAdapter, OpenAiConfig};
pub use types::{ChatRequest, ToolChoice, ToolDefinition};
pub use usage::TokenUsage;
