//! Operations exchanged between replicas
//!
//! Both variants are idempotent at the store: re-applying an insert for a
//! known id, or a delete for an already deleted id, changes nothing. The
//! transport may therefore redeliver freely.

use super::position::Position;
use crate::CharId;
use serde::{Deserialize, Serialize};

/// Insert a new character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOp {
    pub char_id: CharId,
    pub value: String,
    pub position: Position,
}

/// Tombstone an existing character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOp {
    pub char_id: CharId,
}

/// A replicated text operation
///
/// Serialized with a `type` tag:
///
/// ```rust
/// use cotext_core::crdt::text::Operation;
///
/// let op = Operation::delete("c-1".to_string());
/// let json = serde_json::to_string(&op).unwrap();
/// assert_eq!(json, r#"{"type":"delete","charId":"c-1"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Insert(InsertOp),
    Delete(DeleteOp),
}

impl Operation {
    pub fn insert(char_id: CharId, value: String, position: Position) -> Self {
        Operation::Insert(InsertOp {
            char_id,
            value,
            position,
        })
    }

    pub fn delete(char_id: CharId) -> Self {
        Operation::Delete(DeleteOp { char_id })
    }

    /// Id of the character this operation targets
    pub fn char_id(&self) -> &str {
        match self {
            Operation::Insert(op) => &op.char_id,
            Operation::Delete(op) => &op.char_id,
        }
    }
}

/// Effect of applying an operation to a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A new character was added
    Inserted,
    /// A live character became a tombstone
    Deleted,
    /// Duplicate insert, repeated delete, or delete of an unknown id
    Unchanged,
}

impl ApplyOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, ApplyOutcome::Unchanged)
    }
}
