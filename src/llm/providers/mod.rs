//! LLM provider implementations.
//!
//! - [`message`]: Conversation message types shared by every backend
//! - [`sse`]: Server-sent events line parser
//! - [`openai`]: OpenAI-compatible chat completions over SSE

pub mod message;
pub mod openai;
pub mod sse;
