//! Long-lived task that turns queued paragraphs into ordered playback.
//!
//! The scheduler runs a two-stage pipeline: while one paragraph plays, the
//! next one is already being synthesized. Playbacks never overlap and always
//! follow `speak_index` order. An end marker re-arms listening for its
//! answer once everything queued before it has played.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::messages::SpeakItem;
use super::speak_queue::SpeakQueue;
use crate::audio::AudioPlayer;
use crate::session::SessionStatus;
use crate::tts::{AudioHandle, SpeechSynthesizer};

/// An item after its synthesis stage.
enum Prepared {
    Speech(SpeakItem, AudioHandle),
    EndMarker(SpeakItem),
    Skipped,
}

pub struct SpeakScheduler {
    queue: Arc<SpeakQueue>,
    session: Arc<SessionStatus>,
    tts: Arc<dyn SpeechSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    poll_interval: Duration,
}

impl SpeakScheduler {
    pub fn new(
        queue: Arc<SpeakQueue>,
        session: Arc<SessionStatus>,
        tts: Arc<dyn SpeechSynthesizer>,
        player: Arc<dyn AudioPlayer>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            session,
            tts,
            player,
            poll_interval,
        }
    }

    /// Run until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            "speak scheduler started"
        );
        let mut pending: Option<Prepared> = None;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let current = match pending.take() {
                Some(prepared) => prepared,
                None => {
                    let Some(item) = self.queue.pop() else {
                        tokio::select! {
                            () = cancel.cancelled() => break,
                            () = self.queue.wait(self.poll_interval) => {}
                        }
                        continue;
                    };
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        prepared = self.prepare(item) => prepared,
                    }
                }
            };

            match current {
                Prepared::Skipped => {}
                Prepared::EndMarker(item) => self.finish_answer(&item),
                Prepared::Speech(item, audio) => {
                    let next = self.queue.pop();
                    let play = self.play(&item, audio);
                    let prepare_next = async {
                        match next {
                            Some(next) => Some(self.prepare(next).await),
                            None => None,
                        }
                    };
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        ((), next) = async { tokio::join!(play, prepare_next) } => {
                            pending = next;
                        }
                    }
                }
            }
        }

        info!("speak scheduler stopped");
    }

    fn is_broken(&self, item: &SpeakItem) -> bool {
        self.session.is_break_requested(item.answer_id)
    }

    async fn prepare(&self, item: SpeakItem) -> Prepared {
        if item.is_end_marker {
            return Prepared::EndMarker(item);
        }
        if self.is_broken(&item) {
            debug!(answer_id = %item.answer_id, speak_index = item.speak_index, "dropping interrupted speech");
            return Prepared::Skipped;
        }
        let Some(text) = item.text.as_deref() else {
            return Prepared::Skipped;
        };
        match self.tts.synthesize(text).await {
            Ok(audio) => Prepared::Speech(item, audio),
            Err(e) => {
                warn!(speak_index = item.speak_index, "synthesis failed: {e}");
                Prepared::Skipped
            }
        }
    }

    async fn play(&self, item: &SpeakItem, audio: AudioHandle) {
        if self.is_broken(item) {
            debug!(answer_id = %item.answer_id, speak_index = item.speak_index, "dropping synthesized audio");
            return;
        }
        debug!(speak_index = item.speak_index, "playing");
        if let Err(e) = self.player.play(audio).await {
            warn!(speak_index = item.speak_index, "playback failed: {e}");
        }
    }

    fn finish_answer(&self, item: &SpeakItem) {
        debug!(answer_id = %item.answer_id, speak_index = item.speak_index, "answer finished speaking");
        self.session.rearm_listening(item.answer_id);
    }
}
