//! Token usage tracking for chat requests.
//!
//! Backends report a usage snapshot near the end of a stream. The round
//! controller sums the snapshots of every round so the UI can annotate a
//! finished answer with its token count.

use serde::{Deserialize, Serialize};

/// Token counts for a single chat request/response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt/input.
    pub prompt_tokens: u64,
    /// Number of tokens in the completion/output.
    pub completion_tokens: u64,
    /// Number of reasoning tokens (if the model reports them).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
}

impl TokenUsage {
    /// Create a new token usage record.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            reasoning_tokens: None,
        }
    }

    /// Set reasoning tokens.
    pub fn with_reasoning_tokens(mut self, tokens: u64) -> Self {
        self.reasoning_tokens = Some(tokens);
        self
    }

    /// Total tokens consumed (prompt + completion + reasoning).
    pub fn total(&self) -> u64 {
        self.prompt_tokens
            .saturating_add(self.completion_tokens)
            .saturating_add(self.reasoning_tokens.unwrap_or(0))
    }

    /// Accumulate token counts from another usage record.
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.reasoning_tokens = match (self.reasoning_tokens, other.reasoning_tokens) {
            (Some(a), Some(b)) => Some(a.saturating_add(b)),
            (a, b) => a.or(b),
        };
    }

    /// Parse an OpenAI-style `usage` object.
    ///
    /// Returns `None` when the value is null, empty, or has no token counts.
    pub fn from_openai(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let prompt = obj.get("prompt_tokens").and_then(|v| v.as_u64());
        let completion = obj.get("completion_tokens").and_then(|v| v.as_u64());
        if prompt.is_none() && completion.is_none() {
            return None;
        }
        let mut usage = Self::new(prompt.unwrap_or(0), completion.unwrap_or(0));
        if let Some(reasoning) = obj
            .get("completion_tokens_details")
            .and_then(|d| d.get("reasoning_tokens"))
            .and_then(|v| v.as_u64())
            && reasoning > 0
        {
            usage.reasoning_tokens = Some(reasoning);
        }
        Some(usage)
    }
}

impl Default for TokenUsage {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_includes_reasoning() {
        let usage = TokenUsage::new(100, 50).with_reasoning_tokens(25);
        assert_eq!(usage.total(), 175);
    }

    #[test]
    fn add_accumulates_across_rounds() {
        let mut total = TokenUsage::default();
        total.add(&TokenUsage::new(500, 200));
        total.add(&TokenUsage::new(700, 300).with_reasoning_tokens(100));
        assert_eq!(total.prompt_tokens, 1200);
        assert_eq!(total.completion_tokens, 500);
        assert_eq!(total.reasoning_tokens, Some(100));
        assert_eq!(total.total(), 1800);
    }

    #[test]
    fn add_saturates() {
        let mut usage = TokenUsage::new(u64::MAX, 0);
        usage.add(&TokenUsage::new(1, 0));
        assert_eq!(usage.prompt_tokens, u64::MAX);
    }

    #[test]
    fn from_openai_reads_counts() {
        let value = serde_json::json!({
            "prompt_tokens": 12,
            "completion_tokens": 8,
            "total_tokens": 20,
            "completion_tokens_details": { "reasoning_tokens": 3 }
        });
        let usage = TokenUsage::from_openai(&value);
        assert_eq!(
            usage,
            Some(TokenUsage::new(12, 8).with_reasoning_tokens(3))
        );
    }

    #[test]
    fn from_openai_ignores_empty() {
        assert!(TokenUsage::from_openai(&serde_json::json!({})).is_none());
        assert!(TokenUsage::from_openai(&serde_json::Value::Null).is_none());
    }
}
