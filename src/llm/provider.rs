//! Chat backend trait.
//!
//! A [`ChatBackend`] turns one [`ChatRequest`] into a lazy, finite stream of
//! normalized [`StreamEvent`]s. Transport failures surface either as the
//! `Err` of [`ChatBackend::stream`] (before any bytes arrive) or as an `Err`
//! item inside the stream, after which consumers stop reading.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use super::error::LlmError;
use super::events::StreamEvent;
use super::types::ChatRequest;

/// A boxed stream of normalized chat events.
pub type ChatEventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Trait for chat completion backends.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Backend name for logs (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Issue a streamed request.
    async fn stream(&self, request: &ChatRequest) -> Result<ChatEventStream, LlmError>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::llm::providers::message::Message;
    use futures_util::StreamExt;

    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn stream(&self, request: &ChatRequest) -> Result<ChatEventStream, LlmError> {
            let text = request
                .messages
                .last()
                .map(|m| m.text_content().to_string())
                .unwrap_or_default();
            let events = vec![Ok(StreamEvent::text(text))];
            Ok(Box::pin(futures_util::stream::iter(events)))
        }
    }

    #[tokio::test]
    async fn backend_is_object_safe() {
        let backend: Box<dyn ChatBackend> = Box::new(EchoBackend);
        assert_eq!(backend.name(), "echo");
        let req = ChatRequest::new("m", vec![Message::user("ping")]);
        let mut stream = backend.stream(&req).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.text.as_deref(), Some("ping"));
        assert!(stream.next().await.is_none());
    }
}
