//! Text-to-speech contract.
//!
//! Concrete engines live outside this crate. The speak scheduler only needs
//! something that turns a paragraph into a playable [`AudioHandle`].

use async_trait::async_trait;

use crate::error::Result;

/// Synthesized audio, ready for playback.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioHandle {
    /// The text this audio speaks.
    pub text: String,
    /// Mono f32 samples.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioHandle {
    pub fn new(text: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            text: text.into(),
            samples,
            sample_rate,
        }
    }

    /// Playback length.
    pub fn duration(&self) -> std::time::Duration {
        if self.sample_rate == 0 {
            return std::time::Duration::ZERO;
        }
        std::time::Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// A speech synthesis engine.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with the configured voice.
    async fn synthesize(&self, text: &str) -> Result<AudioHandle>;
}

/// Synthesizer that produces no samples. Used when no engine is attached.
#[derive(Debug, Default, Clone)]
pub struct SilentSynthesizer {
    voice: String,
}

impl SilentSynthesizer {
    pub fn new(voice: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioHandle> {
        tracing::debug!(voice = %self.voice, chars = text.chars().count(), "silent synthesis");
        Ok(AudioHandle::new(text, Vec::new(), 24_000))
    }
}
