//! Voice input contract.
//!
//! The coordinator only calls [`VoiceInput::listen`] while listening is
//! enabled; engines do not need to watch the session themselves.

use async_trait::async_trait;

use crate::error::Result;

/// Captures one utterance and returns its transcription.
#[async_trait]
pub trait VoiceInput: Send + Sync {
    /// Block until the user has said something. An empty string means
    /// nothing intelligible was heard.
    async fn listen(&self) -> Result<String>;
}
