//! Request-side types shared by every chat backend.
//!
//! - [`ChatRequest`] is one streamed completion request.
//! - [`ToolDefinition`] describes a function the model may call.
//! - [`ToolChoice`] controls whether the model may call tools.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::providers::message::Message;

/// A tool definition offered to the model for function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Wire name of the tool.
    pub name: String,
    /// Human-readable description of the tool's purpose.
    pub description: String,
    /// JSON Schema of the tool's parameters.
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Chat-completions `tools[]` entry.
    pub fn to_openai(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Whether and how the model may call tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides.
    #[default]
    Auto,
    /// Tools are offered but must not be called.
    None,
    /// The model must call at least one tool.
    Required,
}

impl ToolChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::None => "none",
            Self::Required => "required",
        }
    }
}

impl fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One streamed chat completion request.
///
/// # Examples
///
/// ```
/// use parley::llm::providers::message::Message;
/// use parley::llm::types::{ChatRequest, ToolChoice};
///
/// let req = ChatRequest::new("gpt-4o-mini", vec![Message::user("hi")]);
/// assert!(!req.has_tools());
/// assert!(req.tool_choice.is_none());
/// let _ = ToolChoice::Auto;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,
    /// Full conversation so far, system prompt first.
    pub messages: Vec<Message>,
    /// Tools offered on this request, if any.
    pub tools: Option<Vec<ToolDefinition>>,
    /// Tool choice, meaningful only alongside tools.
    pub tool_choice: Option<ToolChoice>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: None,
            tool_choice: None,
        }
    }

    /// Attach tools; an empty list leaves the request tool-free.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>, choice: ToolChoice) -> Self {
        if tools.is_empty() {
            self.tools = None;
            self.tool_choice = None;
        } else {
            self.tools = Some(tools);
            self.tool_choice = Some(choice);
        }
        self
    }

    /// Whether at least one tool is offered.
    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_choice_wire_names() {
        assert_eq!(ToolChoice::Auto.to_string(), "auto");
        assert_eq!(ToolChoice::None.to_string(), "none");
        assert_eq!(ToolChoice::Required.to_string(), "required");
    }

    #[test]
    fn tool_choice_deserializes_from_config_strings() {
        let choice: Result<ToolChoice, _> = serde_json::from_str("\"required\"");
        assert_eq!(choice.ok(), Some(ToolChoice::Required));
    }

    #[test]
    fn with_empty_tools_stays_tool_free() {
        let req = ChatRequest::new("m", Vec::new()).with_tools(Vec::new(), ToolChoice::Auto);
        assert!(!req.has_tools());
        assert!(req.tool_choice.is_none());
    }

    #[test]
    fn with_tools_sets_choice() {
        let def = ToolDefinition::new("t", "d", serde_json::json!({"type": "object"}));
        let req = ChatRequest::new("m", Vec::new()).with_tools(vec![def], ToolChoice::Auto);
        assert!(req.has_tools());
        assert_eq!(req.tool_choice, Some(ToolChoice::Auto));
    }

    #[test]
    fn tool_definition_openai_shape() {
        let def = ToolDefinition::new("t", "does t", serde_json::json!({"type": "object"}));
        let json = def.to_openai();
        assert_eq!(json["type"], "function");
        assert_eq!(json["function"]["name"], "t");
        assert_eq!(json["function"]["description"], "does t");
    }
}
