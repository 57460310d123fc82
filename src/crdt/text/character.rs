//! Character: a single grapheme with its CRDT metadata
//!
//! Characters are created by an insert operation and never removed. A
//! delete only flips the tombstone flag, so operations that arrive later and
//! reference the character still resolve the same way on every replica.

use super::position::Position;
use crate::CharId;
use serde::{Deserialize, Serialize};

/// A character in the replicated text
///
/// # Example
///
/// ```rust
/// use cotext_core::crdt::text::{Character, Position};
///
/// let pos = Position::new(vec![32], "client1".to_string(), 1);
/// let mut ch = Character::new("c-1".to_string(), "h".to_string(), pos);
///
/// assert!(!ch.is_deleted());
/// ch.mark_deleted();
/// assert!(ch.is_deleted());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Unique identifier, unrelated to the value
    pub id: CharId,

    /// The grapheme cluster it was typed as; may join with its neighbours
    pub value: String,

    /// Immutable position in the sequence
    pub position: Position,

    /// Tombstone flag - deleted characters are marked, not removed
    #[serde(default)]
    pub deleted: bool,
}

impl Character {
    /// Create a new live character
    pub fn new(id: CharId, value: String, position: Position) -> Self {
        Self {
            id,
            value,
            position,
            deleted: false,
        }
    }

    /// Check if this character has been deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Mark this character as deleted
    ///
    /// Returns `false` when it was already a tombstone.
    pub fn mark_deleted(&mut self) -> bool {
        !std::mem::replace(&mut self.deleted, true)
    }
}
