//! Normalized streaming event model for chat backends.
//!
//! Every backend turns its wire format into a finite sequence of
//! [`StreamEvent`]s. An event may carry any combination of a text token, a
//! reasoning token, tool-call fragments and a usage snapshot; an event with
//! nothing populated is never emitted. The last event of a sequence is marked
//! [`StreamEvent::is_terminal`], but consumers must treat plain exhaustion
//! the same way.
//!
//! # Examples
//!
//! ```
//! use parley::llm::events::{StreamEvent, ToolCallDelta};
//!
//! let token = StreamEvent::text("Hello");
//! assert!(!token.is_empty());
//!
//! let fragment = StreamEvent::tool_call_deltas(vec![ToolCallDelta::args(0, "{\"q\":")]);
//! assert_eq!(fragment.tool_call_deltas.len(), 1);
//! ```

use serde::{Deserialize, Serialize};

use super::usage::TokenUsage;

/// A partial tool call as it arrives inside a stream chunk.
///
/// Fragments sharing an `index` belong to the same invocation and must be
/// applied in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Position of the call within the assistant message.
    pub index: u32,
    /// Call identifier, usually present only on the first fragment.
    pub id: Option<String>,
    /// Call kind (`"function"` for every backend seen so far).
    pub kind: Option<String>,
    /// Function name, usually present only on the first fragment.
    pub name: Option<String>,
    /// A slice of the JSON argument string.
    pub args_fragment: Option<String>,
}

impl ToolCallDelta {
    /// A delta opening a call with its identity.
    pub fn start(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            kind: Some("function".into()),
            name: Some(name.into()),
            args_fragment: None,
        }
    }

    /// A delta carrying only an argument fragment.
    pub fn args(index: u32, fragment: impl Into<String>) -> Self {
        Self {
            index,
            args_fragment: Some(fragment.into()),
            ..Self::default()
        }
    }
}

/// One event of a chat completion stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamEvent {
    /// Answer text token.
    pub text: Option<String>,
    /// Reasoning token (models that stream their thinking separately).
    pub reasoning: Option<String>,
    /// Tool-call fragments carried by this chunk.
    pub tool_call_deltas: Vec<ToolCallDelta>,
    /// Usage snapshot.
    pub usage: Option<TokenUsage>,
    /// Set on the final event of the stream.
    pub is_terminal: bool,
    /// Finish reason reported by the backend, present on terminal events.
    pub finish_reason: Option<FinishReason>,
}

impl StreamEvent {
    /// A text token event.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A reasoning token event.
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            reasoning: Some(text.into()),
            ..Self::default()
        }
    }

    /// An event carrying tool-call fragments.
    pub fn tool_call_deltas(deltas: Vec<ToolCallDelta>) -> Self {
        Self {
            tool_call_deltas: deltas,
            ..Self::default()
        }
    }

    /// A usage snapshot event.
    pub fn usage(usage: TokenUsage) -> Self {
        Self {
            usage: Some(usage),
            ..Self::default()
        }
    }

    /// A terminal event with the given finish reason.
    pub fn finished(reason: FinishReason) -> Self {
        Self {
            is_terminal: true,
            finish_reason: Some(reason),
            ..Self::default()
        }
    }

    /// Whether the event carries no payload at all.
    ///
    /// Empty strings count as absent.
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(str::is_empty)
            && self.reasoning.as_deref().is_none_or(str::is_empty)
            && self.tool_call_deltas.is_empty()
            && self.usage.is_none()
    }
}

/// The reason the backend stopped generating output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop (end of response).
    Stop,
    /// Hit the max token limit.
    Length,
    /// Model wants to call one or more tools.
    ToolCalls,
    /// Content was filtered by safety systems.
    ContentFilter,
    /// Provider-specific or unknown reason.
    Other,
}

impl FinishReason {
    /// Map an OpenAI-style finish reason string.
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "tool_calls" | "function_call" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            _ => Self::Other,
        }
    }

    /// Whether this reason closes the stream.
    ///
    /// Only `stop` and `tool_calls` end a sequence; anything else is left to
    /// natural exhaustion.
    pub fn ends_stream(self) -> bool {
        matches!(self, Self::Stop | Self::ToolCalls)
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stop => write!(f, "stop"),
            Self::Length => write!(f, "length"),
            Self::ToolCalls => write!(f, "tool_calls"),
            Self::ContentFilter => write!(f, "content_filter"),
            Self::Other => write!(f, "other"),
        }
    }
}
