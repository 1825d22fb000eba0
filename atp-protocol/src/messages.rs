//! Protocol message types exchanged between the client and a plugin

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::CodecError;

// ============================================================================
// Handshake
// ============================================================================

/// First message of a plugin, answering the start signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloMessage {
    pub version: i64,
    /// Serialized plugin schema
    pub schema: Value,
}

// ============================================================================
// Execution
// ============================================================================

/// Starts a step with its input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartWorkMessage {
    #[serde(rename = "id")]
    pub step_id: String,
    pub config: Value,
}

/// Signal sent to or emitted by a running step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMessage {
    pub step_id: String,
    pub signal_id: String,
    pub data: Value,
}

/// Final message of a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkDoneMessage {
    #[serde(default)]
    pub step_id: String,
    pub output_id: String,
    pub output_data: Value,
    #[serde(default)]
    pub debug_logs: String,
}

// ============================================================================
// Runtime envelope (protocol version 2)
// ============================================================================

/// Kind of a runtime message, as written in the envelope `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    WorkDone,
    Signal,
    Unknown(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::WorkDone => "work_done",
            MessageKind::Signal => "signal",
            MessageKind::Unknown(kind) => kind,
        }
    }
}

impl From<String> for MessageKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "work_done" => MessageKind::WorkDone,
            "signal" => MessageKind::Signal,
            _ => MessageKind::Unknown(kind),
        }
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Unknown(kind) => kind,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outgoing runtime message with a typed payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMessage<T> {
    pub id: MessageKind,
    pub data: T,
}

impl RuntimeMessage<SignalMessage> {
    pub fn signal(signal: SignalMessage) -> Self {
        Self {
            id: MessageKind::Signal,
            data: signal,
        }
    }
}

impl RuntimeMessage<WorkDoneMessage> {
    pub fn work_done(done: WorkDoneMessage) -> Self {
        Self {
            id: MessageKind::WorkDone,
            data: done,
        }
    }
}

/// Incoming runtime message whose payload is kept opaque until its kind is known
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeEnvelope {
    pub id: MessageKind,
    pub data: ciborium::Value,
}

impl RuntimeEnvelope {
    /// Decode the payload as `T`
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        self.data
            .deserialized()
            .map_err(|e| CodecError::Decode(format!("invalid '{}' payload: {e}", self.id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_work_uses_id_on_the_wire() {
        let message = StartWorkMessage {
            step_id: "greet".to_string(),
            config: serde_json::json!({"name": "Ada"}),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["id"], "greet");
        assert!(value.get("step_id").is_none());
    }

    #[test]
    fn message_kinds_round_trip_through_strings() {
        assert_eq!(MessageKind::from("signal".to_string()), MessageKind::Signal);
        assert_eq!(MessageKind::from("work_done".to_string()), MessageKind::WorkDone);
        assert_eq!(
            MessageKind::from("heartbeat".to_string()),
            MessageKind::Unknown("heartbeat".to_string())
        );
        assert_eq!(String::from(MessageKind::Unknown("x".to_string())), "x");
    }

    #[test]
    fn work_done_defaults_optional_fields() {
        let done: WorkDoneMessage = serde_json::from_value(serde_json::json!({
            "output_id": "success",
            "output_data": {}
        }))
        .unwrap();
        assert_eq!(done.step_id, "");
        assert_eq!(done.debug_logs, "");
    }
}
