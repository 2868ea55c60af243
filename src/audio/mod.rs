//! Audio playback contract.

use async_trait::async_trait;

use crate::error::Result;
use crate::tts::AudioHandle;

/// Plays synthesized speech. `play` returns once playback has finished.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, audio: AudioHandle) -> Result<()>;
}

/// Player that discards audio, waiting out its duration.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlayer;

#[async_trait]
impl AudioPlayer for NullPlayer {
    async fn play(&self, audio: AudioHandle) -> Result<()> {
        let duration = audio.duration();
        tracing::debug!(text = %audio.text, ms = duration.as_millis() as u64, "discarding audio");
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
        Ok(())
    }
}
