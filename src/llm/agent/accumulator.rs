//! Reassembly of streamed tool-call fragments.
//!
//! The [`ToolCallAccumulator`] merges [`ToolCallDelta`]s keyed by their
//! integer index into complete [`ToolCall`]s. Arguments are concatenated in
//! arrival order; identity fields are taken from the first fragment that
//! supplies a non-empty value and never overwritten afterwards.
//!
//! # Usage
//!
//! ```
//! use parley::llm::agent::accumulator::ToolCallAccumulator;
//! use parley::llm::events::ToolCallDelta;
//!
//! let mut acc = ToolCallAccumulator::new();
//! acc.merge(&ToolCallDelta { index: 0, name: Some("foo".into()), ..Default::default() });
//! acc.merge(&ToolCallDelta::args(0, "{\"a\":"));
//! acc.merge(&ToolCallDelta::args(0, "1}"));
//!
//! let calls = acc.into_calls();
//! assert_eq!(calls.len(), 1);
//! assert_eq!(calls[0].name, "foo");
//! assert_eq!(calls[0].args, "{\"a\":1}");
//! ```

use std::collections::BTreeMap;

use crate::llm::events::ToolCallDelta;
use crate::llm::providers::message::ToolCall;

/// Index-keyed accumulator for one round's tool calls.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, ToolCall>,
}

fn set_once(slot: &mut String, value: Option<&str>) {
    if slot.is_empty()
        && let Some(value) = value.filter(|v| !v.is_empty())
    {
        *slot = value.to_string();
    }
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one fragment.
    pub fn merge(&mut self, delta: &ToolCallDelta) {
        let entry = self.calls.entry(delta.index).or_default();
        set_once(&mut entry.id, delta.id.as_deref());
        set_once(&mut entry.kind, delta.kind.as_deref());
        set_once(&mut entry.name, delta.name.as_deref());
        if let Some(fragment) = &delta.args_fragment {
            entry.args.push_str(fragment);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Completed calls in index order.
    ///
    /// Calls that never received an id get a synthetic one so the tool result
    /// can still be correlated.
    pub fn into_calls(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .map(|(index, mut call)| {
                if call.id.is_empty() {
                    call.id = format!("call_{index}");
                }
                if call.kind.is_empty() {
                    call.kind = "function".into();
                }
                call
            })
            .collect()
    }
}
