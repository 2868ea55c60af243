//! Error types for the llm module.
//!
//! Each error variant carries a stable error code (SCREAMING_SNAKE_CASE)
//! that is included in the Display output and accessible via [`LlmError::code()`].

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Invalid or missing configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Authentication failed (invalid/missing API key).
    pub const AUTH_FAILED: &str = "AUTH_FAILED";

    /// Request to the LLM backend failed.
    pub const REQUEST_FAILED: &str = "REQUEST_FAILED";

    /// Streaming response broke off mid-way.
    pub const STREAM_FAILED: &str = "STREAM_FAILED";

    /// Request timed out in the transport.
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";

    /// Backend-specific error not covered by other variants.
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";
}

/// Errors produced while talking to a chat backend.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    /// Invalid or missing configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    ConfigError(String),

    /// Authentication failed (invalid/missing API key).
    #[error("[{}] {}", error_codes::AUTH_FAILED, .0)]
    AuthError(String),

    /// Request to the backend failed before a stream was established.
    #[error("[{}] {}", error_codes::REQUEST_FAILED, .0)]
    RequestError(String),

    /// The response stream broke off.
    #[error("[{}] {}", error_codes::STREAM_FAILED, .0)]
    StreamError(String),

    /// The transport gave up waiting.
    #[error("[{}] {}", error_codes::TIMEOUT_ERROR, .0)]
    TimeoutError(String),

    /// Backend-specific error not covered by other variants.
    #[error("[{}] {}", error_codes::PROVIDER_ERROR, .0)]
    ProviderError(String),
}

impl LlmError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => error_codes::CONFIG_INVALID,
            Self::AuthError(_) => error_codes::AUTH_FAILED,
            Self::RequestError(_) => error_codes::REQUEST_FAILED,
            Self::StreamError(_) => error_codes::STREAM_FAILED,
            Self::TimeoutError(_) => error_codes::TIMEOUT_ERROR,
            Self::ProviderError(_) => error_codes::PROVIDER_ERROR,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::ConfigError(m)
            | Self::AuthError(m)
            | Self::RequestError(m)
            | Self::StreamError(m)
            | Self::TimeoutError(m)
            | Self::ProviderError(m) => m,
        }
    }

    /// Map a `reqwest` transport error, keeping timeouts distinguishable.
    pub(crate) fn from_transport(context: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(format!("{context}: {err}"))
        } else {
            Self::RequestError(format!("{context}: {err}"))
        }
    }
}

/// Convenience alias for llm results.
pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_variants() {
        assert_eq!(LlmError::ConfigError("x".into()).code(), "CONFIG_INVALID");
        assert_eq!(LlmError::AuthError("x".into()).code(), "AUTH_FAILED");
        assert_eq!(LlmError::RequestError("x".into()).code(), "REQUEST_FAILED");
        assert_eq!(LlmError::StreamError("x".into()).code(), "STREAM_FAILED");
        assert_eq!(LlmError::TimeoutError("x".into()).code(), "TIMEOUT_ERROR");
        assert_eq!(LlmError::ProviderError("x".into()).code(), "PROVIDER_ERROR");
    }

    #[test]
    fn display_includes_code_prefix() {
        let err = LlmError::StreamError("connection reset".into());
        let display = err.to_string();
        assert!(display.starts_with("[STREAM_FAILED]"));
        assert!(display.contains("connection reset"));
    }

    #[test]
    fn message_strips_code() {
        let err = LlmError::AuthError("expired token".into());
        assert_eq!(err.message(), "expired token");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlmError>();
    }
}
