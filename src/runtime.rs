//! Runtime events emitted by the engine for UIs and hosts.
//!
//! Events are broadcast; slow subscribers lag rather than block a turn.
//! Finalized UI messages are also appended to a per-session [`MessageLog`].

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::llm::agent::StopReason;
use crate::llm::usage::TokenUsage;
use crate::pipeline::messages::TurnTrigger;
use crate::session::{AnswerId, SessionSnapshot};

/// What a UI should do with a message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageAction {
    /// Create the message, or replace the content of an existing one.
    #[default]
    Upsert,
    /// Remove a message that turned out to be empty.
    Revoke,
}

/// A chat bubble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiMessage {
    pub id: String,
    /// Speaker label; parenthesized when the message came through voice.
    pub from: String,
    pub content: String,
    /// Whether the UI may offer a "stop" control for this message.
    pub allow_break: bool,
    /// Tokens spent producing the message, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
    #[serde(default)]
    pub action: MessageAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_id: Option<AnswerId>,
}

impl UiMessage {
    pub fn new(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            from: from.into(),
            content: content.into(),
            allow_break: false,
            token_count: None,
            action: MessageAction::Upsert,
            answer_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn for_answer(mut self, answer_id: AnswerId) -> Self {
        self.answer_id = Some(answer_id);
        self.allow_break = true;
        self
    }

    pub fn revoke(id: impl Into<String>) -> Self {
        Self {
            action: MessageAction::Revoke,
            ..Self::new("", "").with_id(id)
        }
    }
}

/// Events that describe what the engine is doing right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    Message(UiMessage),
    TurnStarted {
        answer_id: AnswerId,
        trigger: TurnTrigger,
    },
    TurnFinished {
        answer_id: AnswerId,
        stop: StopReason,
        usage: TokenUsage,
        rounds: u32,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        answer_id: Option<AnswerId>,
        message: String,
    },
    Status(SessionSnapshot),
}

impl RuntimeEvent {
    /// Event name used on the host wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message(_) => "conversation.message",
            Self::TurnStarted { .. } => "conversation.turn_started",
            Self::TurnFinished { .. } => "conversation.turn_finished",
            Self::Error { .. } => "runtime.error",
            Self::Status(_) => "runtime.status",
        }
    }
}

// ── Message log ──────────────────────────────────────────────

/// Append-only log of UI messages, one `timestamp JSON` line each.
#[derive(Debug)]
pub struct MessageLog {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl MessageLog {
    /// Create `log-<timestamp>.txt` inside `dir`.
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let name = format!(
            "log-{}.txt",
            chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
        );
        let path = dir.join(name);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        tracing::info!(path = %path.display(), "message log opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, message: &UiMessage) -> Result<()> {
        let json = serde_json::to_string(message)
            .map_err(|e| crate::error::EngineError::Channel(e.to_string()))?;
        let line = format!(
            "{} {json}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn message_event_serializes_with_type_tag() {
        let msg = UiMessage::new("Xiuliu", "hello").with_id("m1");
        let json = serde_json::to_value(RuntimeEvent::Message(msg)).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["id"], "m1");
        assert_eq!(json["action"], "upsert");
        assert!(json.get("token_count").is_none());
    }

    #[test]
    fn revoke_keeps_id() {
        let msg = UiMessage::revoke("m2");
        assert_eq!(msg.id, "m2");
        assert_eq!(msg.action, MessageAction::Revoke);
    }

    #[test]
    fn event_names_are_namespaced() {
        let event = RuntimeEvent::Error {
            answer_id: None,
            message: "x".into(),
        };
        assert_eq!(event.name(), "runtime.error");
    }

    #[test]
    fn log_writes_timestamped_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = MessageLog::create(dir.path()).unwrap();
        log.append(&UiMessage::new("(Chell)", "Xiuliu hi").with_id("a"))
            .unwrap();
        log.append(&UiMessage::new("Xiuliu", "meow").with_id("b"))
            .unwrap();

        let name = log.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("log-") && name.ends_with(".txt"));

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let (stamp, json) = lines[0].split_at(19);
        assert_eq!(stamp.len(), 19);
        let parsed: UiMessage = serde_json::from_str(json.trim()).unwrap();
        assert_eq!(parsed.from, "(Chell)");
    }
}
