//! Conversation messages exchanged with the chat backend.
//!
//! A [`Message`] mirrors the chat-completions message shape: a role, nullable
//! text content, the tool calls an assistant message carries, and the call id
//! a tool result answers. The same type is persisted by the history store.
//!
//! # Examples
//!
//! ```
//! use parley::llm::providers::message::{Message, Role, ToolCall};
//!
//! let call = ToolCall::function("call_1", "read_file_from_local", r#"{"path":"a.txt"}"#);
//! let request = Message::assistant_with_tool_calls(vec![call]);
//! assert_eq!(request.role, Role::Assistant);
//! assert!(request.content.is_none());
//!
//! let result = Message::tool_result("call_1", "file contents");
//! assert_eq!(result.tool_call_id.as_deref(), Some("call_1"));
//! ```

use serde::{Deserialize, Serialize};

/// The role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant (model) output.
    Assistant,
    /// Tool execution result.
    Tool,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete tool invocation requested by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Backend-assigned call identifier.
    pub id: String,
    /// Call kind, `"function"` in practice.
    pub kind: String,
    /// Tool name.
    pub name: String,
    /// JSON-encoded argument string, exactly as streamed.
    pub args: String,
}

impl ToolCall {
    /// A function call with the given identity and arguments.
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        args: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: "function".into(),
            name: name.into(),
            args: args.into(),
        }
    }

    /// Parse the argument string; an empty string parses as `{}`.
    pub fn parsed_args(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.args.trim().is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.args)
    }
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message.
    pub role: Role,
    /// Text content; `None` for assistant messages that only call tools.
    pub content: Option<String>,
    /// Tool calls made by the assistant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// The call this tool result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a text message with the given role.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// An assistant message that carries tool calls and no text.
    pub fn assistant_with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// A tool result answering `call_id`.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    /// Text content or the empty string.
    pub fn text_content(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Chat-completions wire representation.
    pub fn to_openai(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("role".into(), self.role.as_str().into());
        obj.insert(
            "content".into(),
            match &self.content {
                Some(text) => serde_json::Value::String(text.clone()),
                None => serde_json::Value::Null,
            },
        );
        if !self.tool_calls.is_empty() {
            let calls: Vec<serde_json::Value> = self
                .tool_calls
                .iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.id,
                        "type": if tc.kind.is_empty() { "function" } else { tc.kind.as_str() },
                        "function": {
                            "name": tc.name,
                            "arguments": tc.args,
                        }
                    })
                })
                .collect();
            obj.insert("tool_calls".into(), serde_json::Value::Array(calls));
        }
        if let Some(id) = &self.tool_call_id {
            obj.insert("tool_call_id".into(), id.clone().into());
        }
        serde_json::Value::Object(obj)
    }
}
