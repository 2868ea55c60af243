//! Error types for the parley engine.

use crate::llm::error::LlmError;
use crate::llm::tools::ToolError;

/// Top-level error type for the conversation engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Chat backend or streaming failure.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool dispatch failure that escaped the executor.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// Text-to-speech synthesis error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio playback error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text capture error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Conversation history persistence error.
    #[error("history error: {0}")]
    History(String),

    /// Long-term memory error.
    #[error("memory error: {0}")]
    Memory(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EngineError>;
