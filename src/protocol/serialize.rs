// Serialization layer - Convert frames to/from JSON text
//!
//! Frames are decoded once at the connection boundary into an
//! [`InboundMessage`]; nothing past this module looks at raw JSON.

use super::message::{CaretData, CaretUpdate, CurrentUsers, InboundMessage, UserEntry, UserEvent, WireMessage};
use crate::crdt::text::Operation;
use crate::error::{Result, SyncError};
use serde_json::Value as JsonValue;
use tracing::warn;

/// Decode one inbound frame
///
/// An array frame is a batch: each element is decoded on its own and
/// malformed elements are skipped with a warning, so one bad entry does not
/// cost the rest of the batch. Any other malformed frame is an error the
/// caller drops.
///
/// # Example
///
/// ```rust
/// use cotext_core::protocol::{decode_frame, InboundMessage};
///
/// let frame = r#"[{"type":"delete","charId":"a"},{"type":"bogus"}]"#;
/// match decode_frame(frame).unwrap() {
///     InboundMessage::Batch(ops) => assert_eq!(ops.len(), 1),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub fn decode_frame(text: &str) -> Result<InboundMessage> {
    let value: JsonValue = serde_json::from_str(text)?;

    match value {
        JsonValue::Array(elements) => {
            let ops = elements
                .into_iter()
                .enumerate()
                .filter_map(|(index, element)| {
                    serde_json::from_value::<Operation>(element)
                        .map_err(|e| warn!(index, error = %e, "Skipping malformed batch element"))
                        .ok()
                })
                .collect();
            Ok(InboundMessage::Batch(ops))
        }
        JsonValue::Object(_) => {
            let message: WireMessage = serde_json::from_value(value)?;
            Ok(message.into())
        }
        other => Err(SyncError::Protocol(format!(
            "Expected a JSON object or array frame, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Encode buffered operations as one batch frame
pub fn encode_batch(ops: &[Operation]) -> Result<String> {
    Ok(serde_json::to_string(ops)?)
}

/// Encode a single operation frame
pub fn encode_operation(op: &Operation) -> Result<String> {
    encode_message(&WireMessage::from(op.clone()))
}

/// Encode the local caret position
pub fn encode_caret(user_id: &str, offset: usize) -> Result<String> {
    encode_message(&WireMessage::CaretUpdate(CaretUpdate {
        data: CaretData {
            user_id: user_id.to_string(),
            offset,
        },
    }))
}

/// Encode the full participant list a relay sends to a new connection
pub fn encode_current_users(users: Vec<UserEntry>) -> Result<String> {
    encode_message(&WireMessage::CurrentUsers(CurrentUsers { users }))
}

pub fn encode_user_event(event: UserEvent) -> Result<String> {
    encode_message(&WireMessage::UserEvent(event))
}

/// Serialize any single-object message
pub fn encode_message(message: &WireMessage) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}
