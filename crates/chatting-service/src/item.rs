//! Outbound chat items.

use chrono::{DateTime, Utc};
use delivery_queue::Identified;
use serde::{Deserialize, Serialize};

/// Kind of outbound chat event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    SendMessage,
    EditMessage,
    DeleteMessage,
    PinMessage,
    UnpinMessage,
    ReactMessage,
    MarkSeen,
    Typing,
}

impl MessageKind {
    /// Event name used on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            MessageKind::SendMessage => "message:send",
            MessageKind::EditMessage => "message:edit",
            MessageKind::DeleteMessage => "message:delete",
            MessageKind::PinMessage => "message:pin",
            MessageKind::UnpinMessage => "message:unpin",
            MessageKind::ReactMessage => "message:react",
            MessageKind::MarkSeen => "conversation:seen",
            MessageKind::Typing => "conversation:typing",
        }
    }
}

/// A tagged payload waiting to be delivered.
///
/// Immutable once queued. The id is generated client-side and only used
/// for duplicate checks and log correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryItem {
    pub id: String,
    pub kind: MessageKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl DeliveryItem {
    /// Create a new item with a fresh id.
    pub fn new(kind: MessageKind, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            payload,
            created_at: Utc::now(),
        }
    }
}

impl Identified for DeliveryItem {
    fn queue_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_delivery_item_ids_are_unique() {
        let a = DeliveryItem::new(MessageKind::SendMessage, json!({"text": "a"}));
        let b = DeliveryItem::new(MessageKind::SendMessage, json!({"text": "a"}));
        assert_ne!(a.id, b.id);
        assert_eq!(a.queue_id(), a.id);
    }

    #[test]
    fn test_event_names_are_distinct() {
        let kinds = [
            MessageKind::SendMessage,
            MessageKind::EditMessage,
            MessageKind::DeleteMessage,
            MessageKind::PinMessage,
            MessageKind::UnpinMessage,
            MessageKind::ReactMessage,
            MessageKind::MarkSeen,
            MessageKind::Typing,
        ];
        let mut names: Vec<_> = kinds.iter().map(|k| k.event_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), kinds.len());
    }

    #[test]
    fn test_message_kind_serde() {
        let encoded = serde_json::to_string(&MessageKind::PinMessage).unwrap();
        assert_eq!(encoded, "\"pin_message\"");

        let decoded: MessageKind = serde_json::from_str("\"mark_seen\"").unwrap();
        assert_eq!(decoded, MessageKind::MarkSeen);
    }
}
