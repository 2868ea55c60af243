//! Persisted conversation history.
//!
//! History is kept per [`HistoryChannel`]: ordinary chat and live mode never
//! see each other's messages. Stores keep a bounded tail of each channel and
//! hand out a smaller prompt window from it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::llm::providers::message::{Message, Role};

/// Which conversation a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryChannel {
    #[default]
    Chat,
    Live,
}

/// Storage for conversation history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// The last `n` messages of `channel`, oldest first.
    ///
    /// The window never starts with a tool result whose call was cut off.
    async fn recent(&self, channel: HistoryChannel, n: usize) -> Result<Vec<Message>>;

    /// Append messages to `channel`, trimming it to the store limit.
    async fn append(&self, channel: HistoryChannel, messages: &[Message]) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct HistoryData {
    history: Vec<Message>,
    live_history: Vec<Message>,
}

impl HistoryData {
    fn channel(&self, channel: HistoryChannel) -> &Vec<Message> {
        match channel {
            HistoryChannel::Chat => &self.history,
            HistoryChannel::Live => &self.live_history,
        }
    }

    fn channel_mut(&mut self, channel: HistoryChannel) -> &mut Vec<Message> {
        match channel {
            HistoryChannel::Chat => &mut self.history,
            HistoryChannel::Live => &mut self.live_history,
        }
    }

    fn recent(&self, channel: HistoryChannel, n: usize) -> Vec<Message> {
        let all = self.channel(channel);
        let mut window = &all[all.len().saturating_sub(n)..];
        while window.first().is_some_and(|m| m.role == Role::Tool) {
            window = &window[1..];
        }
        window.to_vec()
    }

    fn append(&mut self, channel: HistoryChannel, messages: &[Message], limit: usize) {
        let list = self.channel_mut(channel);
        list.extend_from_slice(messages);
        let excess = list.len().saturating_sub(limit);
        list.drain(..excess);
    }
}

// ── JSON file ─────────────────────────────────────────────────

/// History persisted to a single JSON file, rewritten on every append.
#[derive(Debug)]
pub struct JsonHistoryStore {
    path: PathBuf,
    limit: usize,
    data: tokio::sync::Mutex<HistoryData>,
}

impl JsonHistoryStore {
    /// Load the file at `path`.
    ///
    /// A missing file starts empty. A corrupt file is logged and replaced on
    /// the next append.
    pub async fn open(path: impl Into<PathBuf>, limit: usize) -> Result<Self> {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), "history file unreadable, starting fresh: {e}");
                HistoryData::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HistoryData::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            limit,
            data: tokio::sync::Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, data: &HistoryData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(data)
            .map_err(|e| EngineError::History(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn recent(&self, channel: HistoryChannel, n: usize) -> Result<Vec<Message>> {
        Ok(self.data.lock().await.recent(channel, n))
    }

    async fn append(&self, channel: HistoryChannel, messages: &[Message]) -> Result<()> {
        let mut data = self.data.lock().await;
        data.append(channel, messages, self.limit);
        self.persist(&data).await
    }
}

// ── In memory ─────────────────────────────────────────────────

/// Volatile history, used when no history file is configured.
#[derive(Debug)]
pub struct InMemoryHistoryStore {
    limit: usize,
    data: std::sync::Mutex<HistoryData>,
}

impl InMemoryHistoryStore {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            data: std::sync::Mutex::new(HistoryData::default()),
        }
    }

    /// Every stored message of `channel`.
    pub fn snapshot(&self, channel: HistoryChannel) -> Vec<Message> {
        self.data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .channel(channel)
            .clone()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn recent(&self, channel: HistoryChannel, n: usize) -> Result<Vec<Message>> {
        Ok(self
            .data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .recent(channel, n))
    }

    async fn append(&self, channel: HistoryChannel, messages: &[Message]) -> Result<()> {
        self.data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .append(channel, messages, self.limit);
        Ok(())
    }
}
