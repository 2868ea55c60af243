//! Versioned host command/event envelopes for the stdio bridge.

use serde::{Deserialize, Serialize};

/// Contract version for host command/event envelopes.
pub const EVENT_VERSION: u32 = 1;

/// Wire command names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandName {
    #[serde(rename = "host.ping")]
    HostPing,
    #[serde(rename = "conversation.send_prompt")]
    SendPrompt,
    #[serde(rename = "conversation.break")]
    BreakAnswer,
    #[serde(rename = "audio.toggle")]
    ToggleAudio,
    #[serde(rename = "listening.toggle")]
    ToggleListening,
    #[serde(rename = "live_mode.toggle")]
    ToggleLiveMode,
    #[serde(rename = "runtime.status")]
    RuntimeStatus,
    #[serde(rename = "runtime.stop")]
    RuntimeStop,
}

impl CommandName {
    /// Render command name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostPing => "host.ping",
            Self::SendPrompt => "conversation.send_prompt",
            Self::BreakAnswer => "conversation.break",
            Self::ToggleAudio => "audio.toggle",
            Self::ToggleListening => "listening.toggle",
            Self::ToggleLiveMode => "live_mode.toggle",
            Self::RuntimeStatus => "runtime.status",
            Self::RuntimeStop => "runtime.stop",
        }
    }

    /// Parse a command name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "host.ping" => Some(Self::HostPing),
            "conversation.send_prompt" => Some(Self::SendPrompt),
            "conversation.break" => Some(Self::BreakAnswer),
            "audio.toggle" => Some(Self::ToggleAudio),
            "listening.toggle" => Some(Self::ToggleListening),
            "live_mode.toggle" => Some(Self::ToggleLiveMode),
            "runtime.status" => Some(Self::RuntimeStatus),
            "runtime.stop" => Some(Self::RuntimeStop),
            _ => None,
        }
    }
}

/// A decoded host command.
///
/// Toggles carry an explicit target state when the payload has `"on"`;
/// otherwise they flip the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Ping,
    SendPrompt { text: String },
    BreakAnswer,
    ToggleAudio { on: Option<bool> },
    ToggleListening { on: Option<bool> },
    ToggleLiveMode { on: Option<bool> },
    Status,
    Stop,
}

impl HostCommand {
    /// Decode the payload of `envelope`.
    pub fn from_envelope(envelope: &CommandEnvelope) -> Result<Self, ContractError> {
        let on = || envelope.payload.get("on").and_then(serde_json::Value::as_bool);
        Ok(match envelope.command {
            CommandName::HostPing => Self::Ping,
            CommandName::SendPrompt => {
                let text = envelope
                    .payload
                    .get("text")
                    .and_then(serde_json::Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| {
                        ContractError::new(
                            ContractErrorKind::InvalidPayload,
                            "conversation.send_prompt requires a non-empty payload.text".to_owned(),
                        )
                    })?;
                Self::SendPrompt {
                    text: text.to_owned(),
                }
            }
            CommandName::BreakAnswer => Self::BreakAnswer,
            CommandName::ToggleAudio => Self::ToggleAudio { on: on() },
            CommandName::ToggleListening => Self::ToggleListening { on: on() },
            CommandName::ToggleLiveMode => Self::ToggleLiveMode { on: on() },
            CommandName::RuntimeStatus => Self::Status,
            CommandName::RuntimeStop => Self::Stop,
        })
    }
}

/// A versioned response envelope from backend host -> frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Build a successful response envelope.
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    /// Build an error response envelope.
    #[must_use]
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}

/// A versioned command envelope from frontend -> backend host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub v: u32,
    pub request_id: String,
    pub command: CommandName,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CommandEnvelope {
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        command: CommandName,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            command,
            payload,
        }
    }

    /// Validate envelope version and required identifiers.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.v != EVENT_VERSION {
            return Err(ContractError::new(
                ContractErrorKind::UnsupportedVersion,
                format!(
                    "unsupported contract version {}; expected {}",
                    self.v, EVENT_VERSION
                ),
            ));
        }
        if self.request_id.trim().is_empty() {
            return Err(ContractError::new(
                ContractErrorKind::InvalidEnvelope,
                "request_id cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// A versioned event envelope from backend host -> frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub v: u32,
    pub event_id: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        event: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            event_id: event_id.into(),
            event: event.into(),
            payload,
        }
    }
}

/// Contract validation error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractErrorKind {
    UnsupportedVersion,
    InvalidEnvelope,
    InvalidPayload,
}

/// Contract validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub message: String,
}

impl ContractError {
    #[must_use]
    pub fn new(kind: ContractErrorKind, message: String) -> Self {
        Self { kind, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_names_round_trip() {
        for name in [
            CommandName::HostPing,
            CommandName::SendPrompt,
            CommandName::BreakAnswer,
            CommandName::ToggleAudio,
            CommandName::ToggleListening,
            CommandName::ToggleLiveMode,
            CommandName::RuntimeStatus,
            CommandName::RuntimeStop,
        ] {
            assert_eq!(CommandName::parse(name.as_str()), Some(name));
            let wire = serde_json::to_value(name).unwrap_or_default();
            assert_eq!(wire, json!(name.as_str()));
        }
        assert_eq!(CommandName::parse("device.move"), None);
    }

    #[test]
    fn send_prompt_requires_text() {
        let env = CommandEnvelope::new("r1", CommandName::SendPrompt, json!({"text": "  hi "}));
        assert_eq!(
            HostCommand::from_envelope(&env),
            Ok(HostCommand::SendPrompt { text: "hi".into() })
        );
        let env = CommandEnvelope::new("r2", CommandName::SendPrompt, json!({}));
        let err = HostCommand::from_envelope(&env).err();
        assert_eq!(err.map(|e| e.kind), Some(ContractErrorKind::InvalidPayload));
    }

    #[test]
    fn toggles_accept_optional_target() {
        let env = CommandEnvelope::new("r", CommandName::ToggleAudio, json!({"on": false}));
        assert_eq!(
            HostCommand::from_envelope(&env),
            Ok(HostCommand::ToggleAudio { on: Some(false) })
        );
        let env = CommandEnvelope::new("r", CommandName::ToggleListening, json!(null));
        assert_eq!(
            HostCommand::from_envelope(&env),
            Ok(HostCommand::ToggleListening { on: None })
        );
    }

    #[test]
    fn validate_rejects_wrong_version_and_empty_id() {
        let mut env = CommandEnvelope::new("r", CommandName::HostPing, json!({}));
        env.v = 0;
        assert_eq!(
            env.validate().map_err(|e| e.kind),
            Err(ContractErrorKind::UnsupportedVersion)
        );
        let env = CommandEnvelope::new(" ", CommandName::HostPing, json!({}));
        assert_eq!(
            env.validate().map_err(|e| e.kind),
            Err(ContractErrorKind::InvalidEnvelope)
        );
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let env: CommandEnvelope = serde_json::from_str(
            r#"{"v":1,"request_id":"r","command":"conversation.break"}"#,
        )
        .unwrap_or_else(|_| unreachable!());
        assert!(env.payload.is_null());
        assert_eq!(HostCommand::from_envelope(&env), Ok(HostCommand::BreakAnswer));
    }
}
