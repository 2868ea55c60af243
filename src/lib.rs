//! Parley: a streaming, tool-using conversation engine with spoken output.
//!
//! A turn flows through these stages:
//! prompt → rounds of streamed chat completions (with tool calls) →
//! paragraph segmentation → speak queue → synthesis → ordered playback.
//!
//! # Architecture
//!
//! - **LLM**: OpenAI-compatible streaming adapter plus the bounded
//!   tool-calling round controller (`llm::agent`)
//! - **Tools**: catalog, registry and built-in handlers (`llm::tools`)
//! - **Pipeline**: coordinator, segmenter, speak queue and scheduler
//! - **Session**: process-wide flags and answer/break bookkeeping
//! - **Host**: versioned JSON-lines command/event bridge for UI shells

pub mod audio;
pub mod config;
pub mod error;
pub mod history;
pub mod host;
pub mod llm;
pub mod memory;
pub mod pipeline;
pub mod runtime;
pub mod session;
pub mod stt;
pub mod tts;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use pipeline::coordinator::{ConversationCoordinator, CoordinatorParts};
pub use runtime::RuntimeEvent;
pub use session::{AnswerId, SessionStatus};
