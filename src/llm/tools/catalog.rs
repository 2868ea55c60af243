//! Catalog of the tools the assistant knows about.
//!
//! [`ToolKind`] is the closed set of tool identities. Each kind carries its
//! wire name, the JSON schema offered to the model and the action notice
//! shown to the user when the call runs.

use serde::{Deserialize, Serialize};

use crate::llm::types::ToolDefinition;

/// Known tool identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolKind {
    #[serde(rename = "get_information_from_google")]
    WebSearch,
    #[serde(rename = "get_text_content_of_webpage")]
    WebPageText,
    #[serde(rename = "download_file_to_local")]
    DownloadFile,
    #[serde(rename = "write_file_to_local")]
    WriteFile,
    #[serde(rename = "read_file_from_local")]
    ReadFile,
    #[serde(rename = "java_script_interpreter")]
    JavaScriptInterpreter,
    #[serde(rename = "nodejs_interpreter")]
    NodejsInterpreter,
    #[serde(rename = "open_local_file_or_webpage")]
    OpenFileOrWebpage,
    #[serde(rename = "create_image_use_GPT")]
    CreateImage,
    #[serde(rename = "get_historical_conversation_content")]
    ConversationMemory,
}

impl ToolKind {
    /// Every kind, in the order definitions are offered to the model.
    pub const ALL: [ToolKind; 10] = [
        Self::WebSearch,
        Self::WebPageText,
        Self::DownloadFile,
        Self::WriteFile,
        Self::ReadFile,
        Self::JavaScriptInterpreter,
        Self::NodejsInterpreter,
        Self::OpenFileOrWebpage,
        Self::CreateImage,
        Self::ConversationMemory,
    ];

    /// Function name used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::WebSearch => "get_information_from_google",
            Self::WebPageText => "get_text_content_of_webpage",
            Self::DownloadFile => "download_file_to_local",
            Self::WriteFile => "write_file_to_local",
            Self::ReadFile => "read_file_from_local",
            Self::JavaScriptInterpreter => "java_script_interpreter",
            Self::NodejsInterpreter => "nodejs_interpreter",
            Self::OpenFileOrWebpage => "open_local_file_or_webpage",
            Self::CreateImage => "create_image_use_GPT",
            Self::ConversationMemory => "get_historical_conversation_content",
        }
    }

    /// Resolve a wire name.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.wire_name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::WebSearch => "Fetch information from Google based on a query string",
            Self::WebPageText => "Get the text content of a webpage based on its url.",
            Self::DownloadFile => "Download a file from a url to the local storage folder.",
            Self::WriteFile => "Write a file to local disk.",
            Self::ReadFile => "Read a file from local disk.",
            Self::JavaScriptInterpreter => {
                "Useful for running JavaScript code in a sandbox. Input is a string of \
                 JavaScript code, output is the result of the code."
            }
            Self::NodejsInterpreter => {
                "Useful for running JavaScript code in a node.js VM. Use \
                 global.variable = value to keep values between calls. Input is a \
                 string of JavaScript code, output is the result of the last line."
            }
            Self::OpenFileOrWebpage => "Open a local file or a webpage and display it to the user",
            Self::CreateImage => {
                "Create an image from a description. If the description is not in \
                 English, translate it first."
            }
            Self::ConversationMemory => {
                "Search earlier conversations for content related to a query"
            }
        }
    }

    /// JSON schema of the parameters.
    pub fn schema(self) -> serde_json::Value {
        match self {
            Self::WebSearch => serde_json::json!({
                "type": "object",
                "properties": {
                    "query_string": {"type": "string", "description": "The search term to lookup"}
                },
                "required": ["query_string"]
            }),
            Self::WebPageText => serde_json::json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "The url of the webpage"}
                },
                "required": ["url"]
            }),
            Self::DownloadFile => serde_json::json!({
                "type": "object",
                "properties": {
                    "file_url": {"type": "string", "description": "The url of the file"},
                    "file_name": {"type": "string", "description": "The name to save the file as"}
                },
                "required": ["file_url", "file_name"]
            }),
            Self::WriteFile => serde_json::json!({
                "type": "object",
                "properties": {
                    "relative_file_path": {
                        "type": "string",
                        "description": "File path relative to the storage folder"
                    },
                    "content": {"type": "string", "description": "The content of the file"}
                },
                "required": ["relative_file_path", "content"]
            }),
            Self::ReadFile => serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string", "description": "The path of the file to read"}
                },
                "required": ["file_path"]
            }),
            Self::JavaScriptInterpreter | Self::NodejsInterpreter => serde_json::json!({
                "type": "object",
                "properties": {
                    "code": {"type": "string", "description": "The javascript code to run"}
                },
                "required": ["code"]
            }),
            Self::OpenFileOrWebpage => serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string", "description": "The path of the file to open"},
                    "url": {"type": "string", "description": "The url of the webpage to open"},
                    "type": {
                        "type": "string",
                        "description": "What to open",
                        "enum": ["file", "webpage"]
                    }
                },
                "required": ["type"]
            }),
            Self::CreateImage => serde_json::json!({
                "type": "object",
                "properties": {
                    "prompt": {"type": "string", "description": "A text description of the desired image"},
                    "background": {"type": "string", "enum": ["auto", "transparent", "opaque"]},
                    "size": {"type": "string", "enum": ["1024x1024", "1536x1024", "1024x1536", "auto"]},
                    "quality": {"type": "string", "enum": ["auto", "high", "medium", "low"]},
                    "n": {"type": "number", "description": "Number of images, 1 to 10"}
                },
                "required": ["prompt"]
            }),
            Self::ConversationMemory => serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "What to look for in earlier conversations"}
                },
                "required": ["query"]
            }),
        }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition::new(self.wire_name(), self.description(), self.schema())
    }

    /// Notice shown to the user when a call of this kind runs.
    ///
    /// Missing arguments render as empty strings; the notice never fails.
    pub fn action_text(self, ai_name: &str, args: &serde_json::Value) -> String {
        let arg = |field: &str| args.get(field).and_then(|v| v.as_str()).unwrap_or("");
        match self {
            Self::WebSearch => format!("{ai_name} is searching {}", arg("query_string")),
            Self::WebPageText => format!("{ai_name} is visiting {}", arg("url")),
            Self::DownloadFile => format!(
                "{ai_name} downloaded {} to {}",
                arg("file_url"),
                arg("file_name")
            ),
            Self::WriteFile => format!(
                "{ai_name} saved\n\n{}\n\nto {}",
                arg("content"),
                arg("relative_file_path")
            ),
            Self::ReadFile => format!("{ai_name} read {}", arg("file_path")),
            Self::JavaScriptInterpreter | Self::NodejsInterpreter => {
                format!("{ai_name} ran\n\n```javascript\n{}\n```", arg("code"))
            }
            Self::OpenFileOrWebpage => {
                let target = if arg("type") == "file" {
                    arg("file_path")
                } else {
                    arg("url")
                };
                format!("{ai_name} asked to open {target}")
            }
            Self::CreateImage => {
                let n = args.get("n").and_then(|v| v.as_u64()).unwrap_or(1);
                let or_auto = |field: &str| match arg(field) {
                    "" => "auto",
                    value => value,
                };
                format!(
                    "{ai_name} is generating {n} image(s) of size `{}`, quality `{}`, \
                     background `{}`.\nPrompt:\n\n```\n{}\n```",
                    or_auto("size"),
                    or_auto("quality"),
                    or_auto("background"),
                    arg("prompt")
                )
            }
            Self::ConversationMemory => {
                format!("{ai_name} is recalling {}", arg("query"))
            }
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_wire_name(kind.wire_name()), Some(kind));
        }
        assert_eq!(ToolKind::from_wire_name("rm_rf"), None);
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&ToolKind::CreateImage).unwrap_or_default();
        assert_eq!(json, "\"create_image_use_GPT\"");
        let back: Result<ToolKind, _> = serde_json::from_str("\"read_file_from_local\"");
        assert_eq!(back.ok(), Some(ToolKind::ReadFile));
    }

    #[test]
    fn every_schema_is_an_object_with_required_list() {
        for kind in ToolKind::ALL {
            let schema = kind.schema();
            assert_eq!(schema["type"], "object", "{kind}");
            assert!(schema["required"].is_array(), "{kind}");
        }
    }

    #[test]
    fn search_action_names_the_query() {
        let text = ToolKind::WebSearch.action_text(
            "Xiuliu",
            &serde_json::json!({"query_string": "rust async"}),
        );
        assert_eq!(text, "Xiuliu is searching rust async");
    }

    #[test]
    fn open_action_picks_target_by_type() {
        let file = ToolKind::OpenFileOrWebpage.action_text(
            "A",
            &serde_json::json!({"type": "file", "file_path": "/tmp/x", "url": "http://u"}),
        );
        assert_eq!(file, "A asked to open /tmp/x");
        let page = ToolKind::OpenFileOrWebpage
            .action_text("A", &serde_json::json!({"type": "webpage", "url": "http://u"}));
        assert_eq!(page, "A asked to open http://u");
    }

    #[test]
    fn image_action_defaults_to_auto() {
        let text = ToolKind::CreateImage.action_text("A", &serde_json::json!({"prompt": "cat"}));
        assert!(text.contains("1 image(s)"));
        assert!(text.contains("size `auto`"));
        assert!(text.contains("cat"));
    }

    #[test]
    fn action_tolerates_missing_args() {
        let text = ToolKind::ReadFile.action_text("A", &serde_json::Value::Null);
        assert_eq!(text, "A read ");
    }
}
