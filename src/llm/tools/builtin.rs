//! Built-in tool handlers.
//!
//! Covers the tools that need nothing beyond HTTP and the local file system.
//! Interpreters, image generation and opening files on the desktop are
//! supplied by the embedding host through [`ToolRegistry::register`].

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::config::ToolsConfig;

use super::catalog::ToolKind;
use super::registry::ToolRegistry;
use super::types::{ToolContext, ToolError, ToolHandler, required_str, truncate_chars};

/// Register every built-in handler the configuration allows.
///
/// The search tool is only registered when `search_api` is set.
pub fn register_builtins(registry: &mut ToolRegistry, config: &ToolsConfig, client: reqwest::Client) {
    registry.register(ToolKind::ReadFile, Arc::new(ReadFileTool));
    registry.register(ToolKind::WriteFile, Arc::new(WriteFileTool));
    registry.register(
        ToolKind::DownloadFile,
        Arc::new(DownloadFileTool {
            client: client.clone(),
        }),
    );
    registry.register(
        ToolKind::WebPageText,
        Arc::new(WebPageTextTool {
            client: client.clone(),
        }),
    );
    registry.register(ToolKind::ConversationMemory, Arc::new(ConversationMemoryTool));
    if !config.search_api.trim().is_empty() {
        registry.register(
            ToolKind::WebSearch,
            Arc::new(WebSearchTool {
                client,
                endpoint: config.search_api.clone(),
            }),
        );
    }
}

/// Join a model-supplied relative path onto the storage folder.
///
/// Absolute paths and `..` components are rejected.
fn storage_path(storage_dir: &Path, relative: &str) -> Result<PathBuf, ToolError> {
    let rel = Path::new(relative);
    if relative.trim().is_empty() {
        return Err(ToolError::InvalidArguments("path must not be empty".into()));
    }
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(ToolError::InvalidArguments(format!(
            "path must stay inside the storage folder: {relative}"
        )));
    }
    Ok(storage_dir.join(rel))
}

fn require_http_url(url: &str) -> Result<(), ToolError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ToolError::InvalidArguments(
            "url must start with http:// or https://".into(),
        ))
    }
}

// ── Files ─────────────────────────────────────────────────────

/// `read_file_from_local`: relative paths resolve against the storage folder.
pub struct ReadFileTool;

#[async_trait]
impl ToolHandler for ReadFileTool {
    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let file_path = required_str(&args, "file_path")?;
        let path = if Path::new(file_path).is_absolute() {
            PathBuf::from(file_path)
        } else {
            ctx.storage_dir.join(file_path)
        };
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::Failed(format!("failed to read {}: {e}", path.display())))
    }
}

/// `write_file_to_local`: writes inside the storage folder, creating parents.
pub struct WriteFileTool;

#[async_trait]
impl ToolHandler for WriteFileTool {
    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let relative = required_str(&args, "relative_file_path")?;
        let content = required_str(&args, "content")?;
        let path = storage_path(&ctx.storage_dir, relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::Failed(format!("failed to create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolError::Failed(format!("failed to write {}: {e}", path.display())))?;
        Ok(path.display().to_string())
    }
}

/// `download_file_to_local`: saves a URL's body into the storage folder.
pub struct DownloadFileTool {
    client: reqwest::Client,
}

#[async_trait]
impl ToolHandler for DownloadFileTool {
    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let url = required_str(&args, "file_url")?;
        let name = required_str(&args, "file_name")?;
        require_http_url(url)?;
        let path = storage_path(&ctx.storage_dir, name)?;

        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ToolError::Failed(format!("download failed: {e}")))?
            .bytes()
            .await
            .map_err(|e| ToolError::Failed(format!("download failed: {e}")))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::Failed(format!("failed to create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ToolError::Failed(format!("failed to write {}: {e}", path.display())))?;
        tracing::debug!(url, bytes = bytes.len(), "downloaded file");
        Ok(path.display().to_string())
    }
}

// ── Web ───────────────────────────────────────────────────────

/// Elements whose text never reaches the model.
const SKIPPED: [&str; 7] = ["script", "style", "noscript", "template", "head", "svg", "iframe"];

/// Elements that end a line of text.
const BLOCKS: [&str; 16] = [
    "p", "div", "li", "br", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "pre", "dt", "dd", "section",
    "article",
];

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED.contains(&name) {
        return;
    }
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            collect_text(child, out);
        }
    }
    if BLOCKS.contains(&name) {
        out.push('\n');
    }
}

/// Reduce an HTML document to readable lines of text.
///
/// Text comes from the first of `article`, `main` or `body` that has any,
/// falling back to the whole document.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    for selector in ["article", "main", "body"] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            collect_text(element, &mut raw);
            if !raw.trim().is_empty() {
                break;
            }
            raw.clear();
        }
    }
    if raw.trim().is_empty() {
        collect_text(document.root_element(), &mut raw);
    }
    raw.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// `get_text_content_of_webpage`: page text, bounded by the context limit.
pub struct WebPageTextTool {
    client: reqwest::Client,
}

#[async_trait]
impl ToolHandler for WebPageTextTool {
    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let url = required_str(&args, "url")?;
        require_http_url(url)?;
        let body = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ToolError::Failed(format!("failed to fetch {url}: {e}")))?
            .text()
            .await
            .map_err(|e| ToolError::Failed(format!("failed to read {url}: {e}")))?;
        Ok(truncate_chars(&html_to_text(&body), ctx.web_page_content_limit))
    }
}

/// `get_information_from_google`: queries a custom search JSON endpoint.
pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
}

#[async_trait]
impl ToolHandler for WebSearchTool {
    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let query = required_str(&args, "query_string")?;
        let mut url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| ToolError::Failed(format!("search endpoint is invalid: {e}")))?;
        url.query_pairs_mut().append_pair("q", query);

        let body: serde_json::Value = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ToolError::Failed(format!("search failed: {e}")))?
            .json()
            .await
            .map_err(|e| ToolError::Failed(format!("search returned invalid JSON: {e}")))?;

        let hits: Vec<String> = body
            .get("items")
            .and_then(|i| i.as_array())
            .into_iter()
            .flatten()
            .filter_map(|item| {
                let title = item.get("title")?.as_str()?;
                let snippet = item.get("snippet")?.as_str()?;
                let link = item.get("link").and_then(|l| l.as_str()).unwrap_or("");
                Some(format!("[{title}]({link}): {snippet}"))
            })
            .take(ctx.search_result_limit)
            .collect();

        if hits.is_empty() {
            tracing::warn!(query, "search returned no usable items");
            return Ok("No relevant information found".into());
        }
        Ok(hits.join("\n"))
    }
}

// ── Memory ────────────────────────────────────────────────────

/// `get_historical_conversation_content`: searches long-term memory.
pub struct ConversationMemoryTool;

#[async_trait]
impl ToolHandler for ConversationMemoryTool {
    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let query = required_str(&args, "query")?;
        let memory = ctx
            .memory
            .as_ref()
            .ok_or_else(|| ToolError::Failed("long-term memory is unavailable".into()))?;
        let hits = memory
            .search(query, ctx.search_result_limit)
            .await
            .map_err(|e| ToolError::Failed(e.to_string()))?;
        if hits.is_empty() {
            return Ok("Nothing related was found in earlier conversations".into());
        }
        Ok(hits.join("\n"))
    }
}
