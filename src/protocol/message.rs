//! Wire message types
//!
//! Every frame is a JSON text. A frame is either a bare JSON array (a batch
//! of text operations) or a single object discriminated by its `type` field.

use crate::crdt::text::{DeleteOp, InsertOp, Operation};
use serde::{Deserialize, Serialize};

/// One entry of a `currentUsers` list
///
/// Relays send either `{id, color}` objects or bare id strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserEntry {
    Full {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<u32>,
    },
    Bare(String),
}

impl UserEntry {
    pub fn id(&self) -> &str {
        match self {
            UserEntry::Full { id, .. } => id,
            UserEntry::Bare(id) => id,
        }
    }

    pub fn into_parts(self) -> (String, Option<u32>) {
        match self {
            UserEntry::Full { id, color } => (id, color),
            UserEntry::Bare(id) => (id, None),
        }
    }
}

/// Full replacement of the active participant set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUsers {
    pub users: Vec<UserEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserAction {
    Join,
    Leave,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
}

/// A participant joined or left
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEvent {
    pub action: UserAction,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<UserData>,
}

impl UserEvent {
    pub fn join(user_id: String, color: Option<u32>) -> Self {
        Self {
            action: UserAction::Join,
            user_id,
            data: color.map(|color| UserData { color: Some(color) }),
        }
    }

    pub fn leave(user_id: String) -> Self {
        Self {
            action: UserAction::Leave,
            user_id,
            data: None,
        }
    }

    pub fn color(&self) -> Option<u32> {
        self.data.as_ref().and_then(|d| d.color)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaretData {
    pub user_id: String,
    /// Offset in stored characters within the visible text
    pub offset: usize,
}

/// A participant's caret moved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaretUpdate {
    pub data: CaretData,
}

/// Any single-object frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WireMessage {
    Insert(InsertOp),
    Delete(DeleteOp),
    CurrentUsers(CurrentUsers),
    UserEvent(UserEvent),
    CaretUpdate(CaretUpdate),
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Operations to apply one at a time, in order
    Batch(Vec<Operation>),
    /// A single operation to apply immediately
    Operation(Operation),
    CurrentUsers(Vec<UserEntry>),
    UserEvent(UserEvent),
    CaretUpdate(CaretData),
}

impl From<WireMessage> for InboundMessage {
    fn from(message: WireMessage) -> Self {
        match message {
            WireMessage::Insert(op) => InboundMessage::Operation(Operation::Insert(op)),
            WireMessage::Delete(op) => InboundMessage::Operation(Operation::Delete(op)),
            WireMessage::CurrentUsers(msg) => InboundMessage::CurrentUsers(msg.users),
            WireMessage::UserEvent(event) => InboundMessage::UserEvent(event),
            WireMessage::CaretUpdate(msg) => InboundMessage::CaretUpdate(msg.data),
        }
    }
}

impl From<Operation> for WireMessage {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Insert(op) => WireMessage::Insert(op),
            Operation::Delete(op) => WireMessage::Delete(op),
        }
    }
}
