//! Types shared by the round controller and its observers.

use serde::{Deserialize, Serialize};

use crate::llm::providers::message::ToolCall;
use crate::llm::usage::TokenUsage;

/// Working state of one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundState {
    /// Text streamed so far in this round.
    pub text: String,
    /// Calls accumulated this round, executed at the start of the next one.
    pub pending_tool_calls: Vec<ToolCall>,
    /// 0-based round number, strictly increasing within a turn.
    pub round_number: u32,
    /// Speak index shared by every speech item this round produces.
    pub speak_index: u64,
}

impl RoundState {
    pub fn new(round_number: u32, speak_index: u64) -> Self {
        Self {
            text: String::new(),
            pending_tool_calls: Vec::new(),
            round_number,
            speak_index,
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Why the controller stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A round produced text.
    Done,
    /// The forced final round also produced no text.
    Exhausted,
    /// A break request was observed at a safe point.
    Interrupted,
}

/// Result of a complete turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Final answer text (partial when interrupted, empty when exhausted).
    pub text: String,
    pub stop: StopReason,
    /// Usage summed over every round.
    pub usage: TokenUsage,
    /// Number of requests issued.
    pub rounds: u32,
}

impl TurnOutcome {
    pub fn is_done(&self) -> bool {
        self.stop == StopReason::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_state_starts_empty() {
        let state = RoundState::new(2, 7);
        assert!(!state.has_text());
        assert!(state.pending_tool_calls.is_empty());
        assert_eq!(state.round_number, 2);
        assert_eq!(state.speak_index, 7);
    }

    #[test]
    fn stop_reason_serializes_snake_case() {
        let json = serde_json::to_string(&StopReason::Interrupted).unwrap_or_default();
        assert_eq!(json, "\"interrupted\"");
    }
}
