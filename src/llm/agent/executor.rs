//! Tool executor with timeout and failure capture.
//!
//! The [`ToolExecutor`] resolves a completed [`ToolCall`] through the
//! [`ToolRegistry`], parses its arguments and runs the handler under a
//! timeout. It never fails: every error becomes the text handed back to the
//! model, so a broken tool costs one round rather than the whole turn.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;

use crate::config::ToolsConfig;
use crate::llm::providers::message::ToolCall;
use crate::llm::tools::{ToolContext, ToolError, ToolKind, ToolRegistry};

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    /// Resolved kind, if the name was known and offered.
    pub kind: Option<ToolKind>,
    /// Text sent back to the model.
    pub content: String,
    /// Whether the handler succeeded.
    pub success: bool,
}

/// Executes tool calls with a per-call timeout.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    config: ToolsConfig,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, config: ToolsConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ToolsConfig {
        &self.config
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Run `call`, converting every failure into result text.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutcome {
        let kind = ToolKind::from_wire_name(&call.name);
        match self.try_execute(call, ctx).await {
            Ok(content) => ToolOutcome {
                kind,
                content,
                success: true,
            },
            Err(e) => {
                tracing::warn!(tool_name = %call.name, error = %e, "tool call failed");
                ToolOutcome {
                    kind,
                    content: e.to_string(),
                    success: false,
                }
            }
        }
    }

    async fn try_execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, ToolError> {
        let (kind, handler) = self.registry.resolve(&call.name, &self.config)?;
        let args = call
            .parsed_args()
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let span = tracing::info_span!("tool_execute", tool_name = %kind, call_id = %call.id);
        let timeout = self.timeout();
        async move {
            tracing::debug!("executing tool");
            let start = Instant::now();
            let result = tokio::time::timeout(timeout, handler.execute(args, ctx))
                .await
                .map_err(|_| ToolError::TimedOut(timeout))?;
            tracing::debug!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                ok = result.is_ok(),
                "tool finished"
            );
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl crate::llm::tools::ToolHandler for Echo {
        async fn execute(
            &self,
            args: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<String, ToolError> {
            Ok(args.to_string())
        }
    }

    struct Boom;

    #[async_trait]
    impl crate::llm::tools::ToolHandler for Boom {
        async fn execute(
            &self,
            _args: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<String, ToolError> {
            Err(ToolError::Failed("boom".into()))
        }
    }

    struct Sleepy;

    #[async_trait]
    impl crate::llm::tools::ToolHandler for Sleepy {
        async fn execute(
            &self,
            _args: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<String, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".into())
        }
    }

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(ToolKind::ReadFile, Arc::new(Echo));
        registry.register(ToolKind::WriteFile, Arc::new(Boom));
        ToolExecutor::new(Arc::new(registry), ToolsConfig::default())
    }

    #[tokio::test]
    async fn success_returns_handler_text() {
        let call = ToolCall::function("c", "read_file_from_local", "{\"file_path\":\"a\"}");
        let out = executor().execute(&call, &ToolContext::default()).await;
        assert!(out.success);
        assert_eq!(out.kind, Some(ToolKind::ReadFile));
        assert_eq!(out.content, "{\"file_path\":\"a\"}");
    }

    #[tokio::test]
    async fn handler_failure_becomes_result_text() {
        let call = ToolCall::function("c", "write_file_to_local", "{}");
        let out = executor().execute(&call, &ToolContext::default()).await;
        assert!(!out.success);
        assert_eq!(out.content, "boom");
    }

    #[tokio::test]
    async fn malformed_arguments_are_a_failure_not_a_panic() {
        let call = ToolCall::function("c", "read_file_from_local", "{\"file_path\":");
        let out = executor().execute(&call, &ToolContext::default()).await;
        assert!(!out.success);
        assert!(out.content.starts_with("invalid arguments"));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported() {
        let call = ToolCall::function("c", "format_disk", "{}");
        let out = executor().execute(&call, &ToolContext::default()).await;
        assert!(!out.success);
        assert_eq!(out.kind, None);
        assert_eq!(out.content, "unknown tool: format_disk");
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolKind::WebPageText, Arc::new(Sleepy));
        let config = ToolsConfig {
            timeout_secs: 1,
            ..ToolsConfig::default()
        };
        let executor = ToolExecutor::new(Arc::new(registry), config);
        let call = ToolCall::function("c", "get_text_content_of_webpage", "{}");
        let out = executor.execute(&call, &ToolContext::default()).await;
        assert!(!out.success);
        assert_eq!(out.content, "tool timed out after 1s");
    }
}
