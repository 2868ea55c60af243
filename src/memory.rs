//! Long-term conversation memory.
//!
//! Every finished answer is remembered, and the conversation-memory tool
//! searches what was remembered. Memory is strictly optional: if the store
//! cannot be opened or created the engine runs without it, and failed writes
//! are logged and ignored.
//!
//! Records live in a JSON-lines file so they are easy to inspect, edit and
//! back up.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{EngineError, Result};

/// A searchable text memory.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Remember a piece of text.
    async fn add(&self, text: &str) -> Result<()>;

    /// Up to `limit` remembered texts related to `query`, best match first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;
}

/// Opens or creates a [`MemoryStore`].
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Open an existing store.
    async fn open(&self) -> Result<Arc<dyn MemoryStore>>;

    /// Create a new, empty store.
    async fn create(&self) -> Result<Arc<dyn MemoryStore>>;
}

/// Open the store, creating it when opening fails.
///
/// Returns `None` (after a warning) when neither works.
pub async fn open_best_effort(backend: &dyn MemoryBackend) -> Option<Arc<dyn MemoryStore>> {
    match backend.open().await {
        Ok(store) => return Some(store),
        Err(e) => tracing::debug!("memory store not opened, creating: {e}"),
    }
    match backend.create().await {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!("running without long-term memory: {e}");
            None
        }
    }
}

/// Remember `text`, logging instead of failing.
pub async fn remember_best_effort(memory: Option<&Arc<dyn MemoryStore>>, text: &str) {
    let Some(memory) = memory else { return };
    if text.trim().is_empty() {
        return;
    }
    if let Err(e) = memory.add(text).await {
        tracing::warn!("failed to remember answer: {e}");
    }
}

// ── Scoring ───────────────────────────────────────────────────

fn is_cjk(ch: char) -> bool {
    matches!(ch, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{3040}'..='\u{30FF}')
}

/// Lowercased ASCII words of two or more characters, plus each CJK character.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() || ch == '\'' || ch == '-' {
            current.push(ch.to_ascii_lowercase());
            continue;
        }
        if current.len() > 1 {
            tokens.push(std::mem::take(&mut current));
        }
        current.clear();
        if is_cjk(ch) {
            tokens.push(ch.to_string());
        }
    }
    if current.len() > 1 {
        tokens.push(current);
    }

    tokens
}

/// Fraction of query tokens present in `text`.
fn overlap_score(text: &str, query_tokens: &[String]) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let text_tokens: HashSet<String> = tokenize(text).into_iter().collect();
    let hits = query_tokens
        .iter()
        .filter(|t| text_tokens.contains(*t))
        .count();
    hits as f32 / query_tokens.len() as f32
}

/// Rank `texts` (oldest first) against `query`; newer entries win ties.
fn rank<'a>(texts: impl DoubleEndedIterator<Item = &'a str>, query: &str, limit: usize) -> Vec<String> {
    let query_tokens = tokenize(query);
    let mut scored: Vec<(f32, &str)> = texts
        .rev()
        .map(|t| (overlap_score(t, &query_tokens), t))
        .filter(|(score, _)| *score > 0.0)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, t)| t.to_string())
        .collect()
}

// ── JSON-lines store ──────────────────────────────────────────

/// One remembered text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub text: String,
    /// Unix timestamp (seconds).
    pub created_at: i64,
}

/// File-backed store; the whole file is loaded on open.
#[derive(Debug)]
pub struct JsonlMemoryStore {
    path: PathBuf,
    entries: tokio::sync::Mutex<Vec<MemoryEntry>>,
}

impl JsonlMemoryStore {
    /// Load an existing file. Unparseable lines are skipped.
    pub async fn open(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut entries = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MemoryEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(line = n + 1, "skipping memory record: {e}"),
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            entries: tokio::sync::Mutex::new(entries),
        })
    }

    /// Create an empty file, including parent directories.
    pub async fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            path: path.to_path_buf(),
            entries: tokio::sync::Mutex::new(Vec::new()),
        })
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MemoryStore for JsonlMemoryStore {
    async fn add(&self, text: &str) -> Result<()> {
        let entry = MemoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            created_at: chrono::Utc::now().timestamp(),
        };
        let mut line =
            serde_json::to_string(&entry).map_err(|e| EngineError::Memory(e.to_string()))?;
        line.push('\n');

        let mut entries = self.entries.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        entries.push(entry);
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let entries = self.entries.lock().await;
        Ok(rank(entries.iter().map(|e| e.text.as_str()), query, limit))
    }
}

/// Backend opening a [`JsonlMemoryStore`] at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonlMemoryBackend {
    path: PathBuf,
}

impl JsonlMemoryBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MemoryBackend for JsonlMemoryBackend {
    async fn open(&self) -> Result<Arc<dyn MemoryStore>> {
        Ok(Arc::new(JsonlMemoryStore::open(&self.path).await?))
    }

    async fn create(&self) -> Result<Arc<dyn MemoryStore>> {
        Ok(Arc::new(JsonlMemoryStore::create(&self.path).await?))
    }
}

// ── In-memory store ───────────────────────────────────────────

/// Volatile store, for tests and memory-less hosts that still want recall
/// within a session.
#[derive(Debug, Default)]
pub struct InMemoryMemoryStore {
    texts: std::sync::Mutex<Vec<String>>,
}

impl InMemoryMemoryStore {
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn add(&self, text: &str) -> Result<()> {
        self.texts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let texts = self.texts.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rank(texts.iter().map(String::as_str), query, limit))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    struct BrokenBackend;

    #[async_trait]
    impl MemoryBackend for BrokenBackend {
        async fn open(&self) -> Result<Arc<dyn MemoryStore>> {
            Err(EngineError::Memory("no table".into()))
        }
        async fn create(&self) -> Result<Arc<dyn MemoryStore>> {
            Err(EngineError::Memory("read-only disk".into()))
        }
    }

    #[test]
    fn tokenize_mixes_ascii_words_and_cjk() {
        assert_eq!(
            tokenize("Tuna, 猫粮 and a Rust-lang!"),
            vec!["tuna", "猫", "粮", "and", "rust-lang"]
        );
    }

    #[tokio::test]
    async fn ranking_prefers_overlap_then_recency() {
        let store = InMemoryMemoryStore::default();
        store.add("cats like tuna").await.unwrap();
        store.add("dogs like bones").await.unwrap();
        store.add("tuna is a fish").await.unwrap();
        let hits = store.search("tuna cats", 5).await.unwrap();
        assert_eq!(hits, vec!["cats like tuna", "tuna is a fish"]);

        let hits = store.search("tuna", 5).await.unwrap();
        assert_eq!(hits, vec!["tuna is a fish", "cats like tuna"]);
    }

    #[tokio::test]
    async fn search_honours_limit_and_ignores_misses() {
        let store = InMemoryMemoryStore::default();
        for i in 0..5 {
            store.add(&format!("note {i} about tuna")).await.unwrap();
        }
        assert_eq!(store.search("tuna", 2).await.unwrap().len(), 2);
        assert!(store.search("weather", 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn jsonl_store_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem").join("memory.jsonl");

        let store = JsonlMemoryStore::create(&path).await.unwrap();
        assert!(store.is_empty().await);
        store.add("remember the milk").await.unwrap();
        drop(store);

        let reopened = JsonlMemoryStore::open(&path).await.unwrap();
        assert_eq!(reopened.len().await, 1);
        assert_eq!(
            reopened.search("milk", 3).await.unwrap(),
            vec!["remember the milk"]
        );
    }

    #[tokio::test]
    async fn jsonl_open_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.jsonl");
        std::fs::write(
            &path,
            "{not json}\n{\"id\":\"1\",\"text\":\"kept\",\"created_at\":0}\n",
        )
        .unwrap();
        let store = JsonlMemoryStore::open(&path).await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn best_effort_open_creates_missing_store() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonlMemoryBackend::new(dir.path().join("memory.jsonl"));
        assert!(open_best_effort(&backend).await.is_some());
        assert!(dir.path().join("memory.jsonl").exists());
    }

    #[tokio::test]
    async fn best_effort_open_swallows_failures() {
        assert!(open_best_effort(&BrokenBackend).await.is_none());
    }

    #[tokio::test]
    async fn remember_skips_blank_text() {
        let store: Arc<dyn MemoryStore> = Arc::new(InMemoryMemoryStore::default());
        remember_best_effort(Some(&store), "   ").await;
        remember_best_effort(Some(&store), "kept").await;
        remember_best_effort(None, "ignored").await;
        assert_eq!(store.search("kept", 5).await.unwrap(), vec!["kept"]);
    }
}
