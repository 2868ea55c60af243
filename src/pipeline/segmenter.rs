//! Slices streamed answer text into speakable paragraphs.
//!
//! Text is committed at line boundaries: every time a delta contains a
//! newline, all complete lines in the buffer become one [`SpeakItem`] and the
//! trailing partial line waits for more text. Whatever remains when the round
//! ends is flushed as a final item.

use std::sync::LazyLock;

use regex::Regex;

use super::messages::SpeakItem;
use crate::session::AnswerId;

/// Marker that replaces a trailing filler glyph.
pub const FILLER_MARKER: &str = "喵~";

/// A run of non-word characters, one filler glyph, then trailing punctuation.
static FILLER_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9一-龟]+[喵嘻捏][^a-zA-Z0-9一-龟]*$")
        .expect("filler tail regex should compile")
});

/// Normalize a paragraph before it is spoken.
pub fn clean_speech(text: &str) -> String {
    FILLER_TAIL.replace(text, FILLER_MARKER).into_owned()
}

fn join_lines(block: &str) -> Option<String> {
    let lines: Vec<&str> = block
        .split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }
    let cleaned = clean_speech(&lines.join("\n"));
    (!cleaned.trim().is_empty()).then_some(cleaned)
}

/// Per-round segmenter.
#[derive(Debug)]
pub struct SpeechSegmenter {
    buffer: String,
    speak_index: u64,
    answer_id: AnswerId,
}

impl SpeechSegmenter {
    pub fn new(answer_id: AnswerId, speak_index: u64) -> Self {
        Self {
            buffer: String::new(),
            speak_index,
            answer_id,
        }
    }

    pub fn speak_index(&self) -> u64 {
        self.speak_index
    }

    /// Feed newly arrived text; returns a paragraph once a line completes.
    pub fn push(&mut self, delta: &str) -> Option<SpeakItem> {
        self.buffer.push_str(delta);
        if !delta.contains('\n') {
            return None;
        }
        let cut = self.buffer.rfind('\n')?;
        let rest = self.buffer.split_off(cut + 1);
        let committed = std::mem::replace(&mut self.buffer, rest);
        join_lines(&committed).map(|text| SpeakItem::speech(text, self.speak_index, self.answer_id))
    }

    /// Emit whatever is buffered. Called at round end.
    pub fn flush(&mut self) -> Option<SpeakItem> {
        let remaining = std::mem::take(&mut self.buffer);
        join_lines(&remaining).map(|text| SpeakItem::speech(text, self.speak_index, self.answer_id))
    }
}
