//! Tool registry keyed by [`ToolKind`].
//!
//! The registry maps each known kind to its handler and decides which
//! definitions are offered to the model. A kind is offered only when a
//! handler is registered for it and the configuration does not hide it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ToolsConfig;
use crate::llm::types::ToolDefinition;

use super::catalog::ToolKind;
use super::types::{ToolError, ToolHandler};

/// Registry of tool handlers.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    handlers: HashMap<ToolKind, Arc<dyn ToolHandler>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Replaces any existing handler for the same kind.
    pub fn register(&mut self, kind: ToolKind, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Registered kinds in catalog order.
    pub fn kinds(&self) -> Vec<ToolKind> {
        ToolKind::ALL
            .into_iter()
            .filter(|k| self.handlers.contains_key(k))
            .collect()
    }

    /// Whether `kind` is offered under `config`.
    pub fn is_offered(&self, kind: ToolKind, config: &ToolsConfig) -> bool {
        if !self.handlers.contains_key(&kind) || config.disabled.contains(&kind) {
            return false;
        }
        match kind {
            ToolKind::JavaScriptInterpreter => !config.allow_powerful_interpreter,
            ToolKind::NodejsInterpreter => config.allow_powerful_interpreter,
            _ => true,
        }
    }

    /// Definitions offered to the model, in catalog order.
    pub fn definitions(&self, config: &ToolsConfig) -> Vec<ToolDefinition> {
        ToolKind::ALL
            .into_iter()
            .filter(|k| self.is_offered(*k, config))
            .map(ToolKind::definition)
            .collect()
    }

    /// Resolve a wire name to an offered kind and its handler.
    ///
    /// # Errors
    ///
    /// [`ToolError::UnknownTool`] when the name is not in the catalog, has no
    /// handler, or is not offered under `config`.
    pub fn resolve(
        &self,
        name: &str,
        config: &ToolsConfig,
    ) -> Result<(ToolKind, Arc<dyn ToolHandler>), ToolError> {
        let kind =
            ToolKind::from_wire_name(name).ok_or_else(|| ToolError::UnknownTool(name.into()))?;
        if !self.is_offered(kind, config) {
            return Err(ToolError::UnknownTool(name.into()));
        }
        self.handlers
            .get(&kind)
            .cloned()
            .map(|h| (kind, h))
            .ok_or_else(|| ToolError::UnknownTool(name.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::tools::ToolContext;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl ToolHandler for Fixed {
        async fn execute(
            &self,
            _args: serde_json::Value,
            _ctx: &ToolContext,
        ) -> Result<String, ToolError> {
            Ok(self.0.to_string())
        }
    }

    fn full_registry() -> ToolRegistry {
        let mut reg = ToolRegistry::new();
        for kind in ToolKind::ALL {
            reg.register(kind, Arc::new(Fixed("ok")));
        }
        reg
    }

    fn names(defs: &[ToolDefinition]) -> Vec<&str> {
        defs.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn unregistered_kinds_are_not_offered() {
        let mut reg = ToolRegistry::new();
        reg.register(ToolKind::ReadFile, Arc::new(Fixed("ok")));
        let defs = reg.definitions(&ToolsConfig::default());
        assert_eq!(names(&defs), vec!["read_file_from_local"]);
    }

    #[test]
    fn sandboxed_interpreter_offered_by_default() {
        let defs = full_registry().definitions(&ToolsConfig::default());
        let names = names(&defs);
        assert!(names.contains(&"java_script_interpreter"));
        assert!(!names.contains(&"nodejs_interpreter"));
        assert_eq!(names.len(), 9);
    }

    #[test]
    fn powerful_interpreter_replaces_sandboxed_one() {
        let config = ToolsConfig {
            allow_powerful_interpreter: true,
            ..ToolsConfig::default()
        };
        let defs = full_registry().definitions(&config);
        let names = names(&defs);
        assert!(names.contains(&"nodejs_interpreter"));
        assert!(!names.contains(&"java_script_interpreter"));
        let pos = names.iter().position(|n| *n == "nodejs_interpreter");
        assert_eq!(pos, Some(5));
    }

    #[test]
    fn disabled_tools_are_hidden_and_unresolvable() {
        let config = ToolsConfig {
            disabled: vec![ToolKind::WebSearch],
            ..ToolsConfig::default()
        };
        let reg = full_registry();
        assert!(!names(&reg.definitions(&config)).contains(&"get_information_from_google"));
        assert!(matches!(
            reg.resolve("get_information_from_google", &config),
            Err(ToolError::UnknownTool(_))
        ));
    }

    #[test]
    fn resolve_unknown_name() {
        let reg = full_registry();
        let err = reg.resolve("launch_missiles", &ToolsConfig::default()).err();
        assert_eq!(err, Some(ToolError::UnknownTool("launch_missiles".into())));
    }

    #[tokio::test]
    async fn resolve_returns_handler() {
        let reg = full_registry();
        let resolved = reg.resolve("read_file_from_local", &ToolsConfig::default());
        let Ok((kind, handler)) = resolved else {
            unreachable!("read tool is registered");
        };
        assert_eq!(kind, ToolKind::ReadFile);
        let out = handler
            .execute(serde_json::json!({}), &ToolContext::default())
            .await;
        assert_eq!(out, Ok("ok".to_string()));
    }
}
