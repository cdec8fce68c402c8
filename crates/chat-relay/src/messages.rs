//! Relay protocol frames.

use serde::{Deserialize, Serialize};

/// Relay frame types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelayMessageType {
    // Connection
    Auth,
    AuthResult,
    Heartbeat,
    Error,

    // Outbound chat events and their acknowledgements
    Event,
    Ack,

    // Server-pushed chat traffic (messages, pins, reactions, presence)
    Incoming,
}

/// A frame sent to/from the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMessage {
    #[serde(rename = "type")]
    pub msg_type: RelayMessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

impl RelayMessage {
    /// Create a bare frame of the given type.
    pub fn new(msg_type: RelayMessageType) -> Self {
        Self {
            msg_type,
            event_name: None,
            ack_id: None,
            payload: None,
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
            error: None,
            success: None,
        }
    }

    /// Create an AUTH frame.
    pub fn auth(token: &str, device_id: &str) -> Self {
        Self::new(RelayMessageType::Auth).with_payload(serde_json::json!({
            "token": token,
            "deviceId": device_id
        }))
    }

    /// Create a HEARTBEAT frame.
    pub fn heartbeat() -> Self {
        Self::new(RelayMessageType::Heartbeat)
    }

    /// Create an EVENT frame that expects an ACK carrying `ack_id`.
    pub fn event(event_name: &str, ack_id: &str, payload: serde_json::Value) -> Self {
        let mut msg = Self::new(RelayMessageType::Event).with_payload(payload);
        msg.event_name = Some(event_name.to_string());
        msg.ack_id = Some(ack_id.to_string());
        msg
    }

    /// Set the payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
