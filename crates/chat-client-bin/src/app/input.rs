//! Turning terminal input into chat payloads.

use serde_json::{json, Value};

/// Build a `message:send` payload from one line of input. Blank lines yield nothing.
pub fn compose_message(conversation_id: &str, line: &str) -> Option<Value> {
    let text = line.trim_end_matches(&['\r', '\n'][..]);
    if text.trim().is_empty() {
        return None;
    }

    Some(json!({
        "conversationId": conversation_id,
        "text": text,
    }))
}
