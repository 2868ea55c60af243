//! Tool catalog, registry and built-in handlers.

pub mod builtin;
pub mod catalog;
pub mod registry;
pub mod types;

pub use builtin::register_builtins;
pub use catalog::ToolKind;
pub use registry::ToolRegistry;
pub use types::{ToolContext, ToolError, ToolHandler};
