//! Configuration types for the conversation engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::llm::tools::ToolKind;
use crate::llm::types::ToolChoice;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Chat backend settings.
    pub llm: LlmConfig,
    /// Names and system prompt.
    pub identity: IdentityConfig,
    /// Conversation history settings.
    pub history: HistoryConfig,
    /// Speech output settings.
    pub speech: SpeechConfig,
    /// Tool offering and limits.
    pub tools: ToolsConfig,
    /// Long-term memory settings.
    pub memory: MemoryConfig,
    /// Host bridge settings.
    pub host: HostConfig,
}

/// Chat backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key. When empty, `OPENAI_API_KEY` is used instead.
    pub api_key: String,
    /// Endpoint root of the OpenAI-compatible API.
    pub base_url: String,
    /// Model name sent with every request.
    pub model: String,
    /// Number of rounds that may carry tools before the forced final round.
    pub round_limit: usize,
    /// Tool choice sent alongside tool definitions.
    pub tool_choice: ToolChoice,
    /// Whole-request timeout for the HTTP transport.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            round_limit: 3,
            tool_choice: ToolChoice::Auto,
            request_timeout_secs: 40,
        }
    }
}

impl LlmConfig {
    /// The configured key, or `OPENAI_API_KEY` when the configured key is empty.
    pub fn effective_api_key(&self) -> String {
        if self.api_key.trim().is_empty() {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        } else {
            self.api_key.clone()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Who is talking to whom.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Name the user is addressed by.
    pub admin_name: String,
    /// Name of the assistant; voice utterances must start with it.
    pub ai_name: String,
    /// System prompt placed first in every request.
    pub system_prompt: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            admin_name: "Chell".to_owned(),
            ai_name: "Xiuliu".to_owned(),
            system_prompt: "You are Xiuliu, a virtual cat assistant. Follow these rules when \
                            replying:\n1. Reply playfully in a cat-like style.\n2. Call \
                            functions to improve the quality of your replies.\n3. Use \
                            markdown for replies and for showing images."
                .to_owned(),
        }
    }
}

/// Conversation history configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of persisted messages placed in each prompt.
    pub prompt_window: usize,
    /// Number of messages the store keeps.
    pub store_limit: usize,
    /// History file. `None` keeps history in memory only.
    pub path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            prompt_window: 12,
            store_limit: 50,
            path: default_data_dir().map(|d| d.join("history.json")),
        }
    }
}

/// Speech output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Whether replies are spoken at startup.
    pub audio_enabled: bool,
    /// How long the speak scheduler sleeps on an empty queue.
    pub poll_interval_ms: u64,
    /// Voice name handed to the synthesizer.
    pub voice: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            poll_interval_ms: 1000,
            voice: "zh-CN-XiaoyiNeural".to_owned(),
        }
    }
}

impl SpeechConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Tool offering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Tools never offered to the model.
    pub disabled: Vec<ToolKind>,
    /// Offer the node interpreter in place of the sandboxed one.
    pub allow_powerful_interpreter: bool,
    /// Maximum search hits returned per search.
    pub search_result_limit: usize,
    /// Maximum characters of web page text returned per fetch.
    pub web_page_content_limit: usize,
    /// Per-call timeout.
    pub timeout_secs: u64,
    /// Search endpoint; the query is appended as the `q` parameter.
    /// Empty disables the built-in search tool.
    pub search_api: String,
    /// Folder for downloads and written files.
    pub storage_dir: Option<PathBuf>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            allow_powerful_interpreter: false,
            search_result_limit: 5,
            web_page_content_limit: 6000,
            timeout_secs: 30,
            search_api: String::new(),
            storage_dir: None,
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Storage folder, falling back to the data directory.
    pub fn resolved_storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .or_else(|| default_data_dir().map(|d| d.join("storage")))
            .unwrap_or_else(|| std::env::temp_dir().join("parley-storage"))
    }
}

/// Long-term memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Whether the memory store is opened at all.
    pub enabled: bool,
    /// Memory file. `None` uses the data directory.
    pub path: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl MemoryConfig {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| default_data_dir().map(|d| d.join("memory.jsonl")))
    }
}

/// Host bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Interval between status broadcasts.
    pub status_interval_ms: u64,
    /// Folder for per-session message logs. `None` disables logging.
    pub log_dir: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            status_interval_ms: 1000,
            log_dir: None,
        }
    }
}

impl HostConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms.max(1))
    }
}

fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("parley"))
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::EngineError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::EngineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/parley/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| std::env::temp_dir().join("parley-config"))
            .join("parley")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.llm.round_limit, 3);
        assert_eq!(config.llm.request_timeout_secs, 40);
        assert_eq!(config.history.prompt_window, 12);
        assert_eq!(config.history.store_limit, 50);
        assert_eq!(config.speech.poll_interval_ms, 1000);
        assert_eq!(config.tools.search_result_limit, 5);
        assert_eq!(config.tools.web_page_content_limit, 6000);
        assert_eq!(config.host.status_interval_ms, 1000);
        assert!(config.tools.disabled.is_empty());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let toml_str = r#"
            [llm]
            model = "qwen2.5"
            round_limit = 5

            [tools]
            disabled = ["create_image_use_GPT", "nodejs_interpreter"]
        "#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.model, "qwen2.5");
        assert_eq!(config.llm.round_limit, 5);
        assert_eq!(config.llm.request_timeout_secs, 40);
        assert_eq!(
            config.tools.disabled,
            vec![ToolKind::CreateImage, ToolKind::NodejsInterpreter]
        );
        assert_eq!(config.identity.ai_name, "Xiuliu");
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = EngineConfig::default();
        config.identity.admin_name = "Wheatley".into();
        config.llm.tool_choice = ToolChoice::Required;
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded.identity.admin_name, "Wheatley");
        assert_eq!(loaded.llm.tool_choice, ToolChoice::Required);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = EngineConfig::from_file(std::path::Path::new("/nonexistent/parley.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();
        let result = EngineConfig::from_file(&path);
        assert!(matches!(result, Err(crate::error::EngineError::Config(_))));
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = EngineConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("parley"));
    }

    #[test]
    fn configured_api_key_wins() {
        let llm = LlmConfig {
            api_key: "sk-config".into(),
            ..LlmConfig::default()
        };
        assert_eq!(llm.effective_api_key(), "sk-config");
    }

    #[test]
    fn zero_durations_are_clamped() {
        let speech = SpeechConfig {
            poll_interval_ms: 0,
            ..SpeechConfig::default()
        };
        assert_eq!(speech.poll_interval(), Duration::from_millis(1));
    }
}
