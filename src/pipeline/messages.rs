//! Message types passed between pipeline stages.

use serde::{Deserialize, Serialize};

use crate::session::AnswerId;

/// One unit of work for the speak scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakItem {
    /// Paragraph to speak. `None` for end markers.
    pub text: Option<String>,
    /// Playback order key; every item of one round shares it.
    pub speak_index: u64,
    /// Set on the item that closes a turn's speech.
    pub is_end_marker: bool,
    /// Turn that produced the item.
    pub answer_id: AnswerId,
}

impl SpeakItem {
    /// A paragraph of speech.
    pub fn speech(text: impl Into<String>, speak_index: u64, answer_id: AnswerId) -> Self {
        Self {
            text: Some(text.into()),
            speak_index,
            is_end_marker: false,
            answer_id,
        }
    }

    /// "Turn finished speaking, re-arm listening."
    pub fn end_marker(speak_index: u64, answer_id: AnswerId) -> Self {
        Self {
            text: None,
            speak_index,
            is_end_marker: true,
            answer_id,
        }
    }
}

/// What started a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnTrigger {
    /// Typed prompt from a host.
    #[default]
    Text,
    /// Utterance captured by the voice loop.
    Voice,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_marker_has_no_text() {
        let id = AnswerId::new();
        let marker = SpeakItem::end_marker(4, id);
        assert!(marker.is_end_marker);
        assert!(marker.text.is_none());
        assert_eq!(marker.answer_id, id);

        let speech = SpeakItem::speech("hi", 4, id);
        assert!(!speech.is_end_marker);
        assert_eq!(speech.text.as_deref(), Some("hi"));
    }
}
