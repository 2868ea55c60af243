//! Core tool types.
//!
//! Defines the [`ToolHandler`] trait every tool implementation satisfies,
//! the [`ToolContext`] handed to each invocation and the [`ToolError`]
//! a handler may fail with.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::memory::MemoryStore;

/// Errors produced while resolving or running a tool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// The model named a tool that is not registered or not offered.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The argument string was not valid JSON or missed a field.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The handler ran and failed; the message is shown to the model verbatim.
    #[error("{0}")]
    Failed(String),

    /// The handler exceeded its time budget.
    #[error("tool timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// Per-invocation context shared by every handler.
#[derive(Clone)]
pub struct ToolContext {
    /// Maximum number of search hits returned to the model.
    pub search_result_limit: usize,
    /// Maximum number of characters of web page text returned to the model.
    pub web_page_content_limit: usize,
    /// Display name of the assistant, used in action notices.
    pub ai_name: String,
    /// Folder that relative file paths resolve against.
    pub storage_dir: PathBuf,
    /// Long-term memory, when it could be opened.
    pub memory: Option<Arc<dyn MemoryStore>>,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("search_result_limit", &self.search_result_limit)
            .field("web_page_content_limit", &self.web_page_content_limit)
            .field("ai_name", &self.ai_name)
            .field("storage_dir", &self.storage_dir)
            .field("memory", &self.memory.is_some())
            .finish()
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            search_result_limit: 5,
            web_page_content_limit: 6000,
            ai_name: "Assistant".into(),
            storage_dir: std::env::temp_dir().join("parley-storage"),
            memory: None,
        }
    }
}

/// A tool implementation.
///
/// Handlers are stateless with respect to the conversation; anything they
/// need beyond their arguments comes through the [`ToolContext`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool and return the text handed back to the model.
    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext)
    -> Result<String, ToolError>;
}

/// Fetch a required string argument.
pub fn required_str<'a>(args: &'a serde_json::Value, field: &str) -> Result<&'a str, ToolError> {
    args.get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing required argument: {field}")))
}

/// Keep at most `max_chars` characters, marking the cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n\n[content truncated at {max_chars} characters]", &s[..cut]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_displays_message_verbatim() {
        assert_eq!(ToolError::Failed("boom".into()).to_string(), "boom");
    }

    #[test]
    fn timed_out_display() {
        let err = ToolError::TimedOut(Duration::from_secs(30));
        assert_eq!(err.to_string(), "tool timed out after 30s");
    }

    #[test]
    fn required_str_reports_missing_field() {
        let args = serde_json::json!({"url": 3});
        let err = required_str(&args, "url").unwrap_err();
        assert_eq!(
            err,
            ToolError::InvalidArguments("missing required argument: url".into())
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "猫猫猫猫";
        let cut = truncate_chars(text, 2);
        assert!(cut.starts_with("猫猫\n"));
        assert!(cut.contains("truncated at 2 characters"));
        assert_eq!(truncate_chars(text, 10), text);
    }

    #[test]
    fn context_debug_hides_memory_handle() {
        let debug = format!("{:?}", ToolContext::default());
        assert!(debug.contains("memory: false"));
    }
}
