//! Presence state management
//!
//! Tracks which participants are connected to the document, the color each
//! one is drawn with, and the last caret offset each one reported. Every
//! message replaces what it covers: `currentUsers` replaces the whole
//! active set, a join or leave touches one participant, a caret update
//! replaces one offset.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};
use uuid::Uuid;

/// Derive a stable color index for a user
///
/// The same id yields the same index on every replica, so participants
/// agree on colors without exchanging them.
///
/// # Example
///
/// ```rust
/// use cotext_core::awareness::color_index_for;
///
/// let a = color_index_for("4e0b7c1a-0000-4000-8000-000000000001", 12);
/// let b = color_index_for("4e0b7c1a-0000-4000-8000-000000000001", 12);
/// assert_eq!(a, b);
/// assert!(a < 12);
/// ```
pub fn color_index_for(user_id: &str, palette_size: u32) -> u32 {
    let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, user_id.as_bytes());
    (digest.as_u128() % u128::from(palette_size.max(1))) as u32
}

/// A connected participant as seen by this replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub color: u32,
    /// Last reported caret offset, in stored characters
    pub caret: Option<usize>,
}

/// Presence of every participant in one document session
#[derive(Debug, Clone)]
pub struct Presence {
    local_user: String,
    palette_size: u32,

    /// Active participants and their color index
    active: BTreeMap<String, u32>,

    /// Remote caret offsets by user
    carets: HashMap<String, usize>,

    local_caret: Option<usize>,
    last_sent_caret: Option<usize>,
}

impl Presence {
    pub fn new(local_user: String, palette_size: u32) -> Self {
        Self {
            local_user,
            palette_size: palette_size.max(1),
            active: BTreeMap::new(),
            carets: HashMap::new(),
            local_caret: None,
            last_sent_caret: None,
        }
    }

    pub fn local_user(&self) -> &str {
        &self.local_user
    }

    /// Replace the active set
    ///
    /// Entries without a color get the derived one. Carets of users that
    /// are no longer active are forgotten.
    pub fn apply_current_users<I>(&mut self, users: I)
    where
        I: IntoIterator<Item = (String, Option<u32>)>,
    {
        let palette_size = self.palette_size;
        self.active = users
            .into_iter()
            .map(|(id, color)| {
                let color = color.unwrap_or_else(|| color_index_for(&id, palette_size));
                (id, color)
            })
            .collect();

        let active = &self.active;
        self.carets.retain(|id, _| active.contains_key(id));
        debug!(users = self.active.len(), "Replaced active participants");
    }

    /// Add one participant
    ///
    /// Returns `false` when nothing changed.
    pub fn apply_join(&mut self, user_id: String, color: Option<u32>) -> bool {
        let color = color.unwrap_or_else(|| color_index_for(&user_id, self.palette_size));
        let previous = self.active.insert(user_id, color);
        previous != Some(color)
    }

    /// Remove one participant
    ///
    /// A leave for a user that is not active is a no-op.
    pub fn apply_leave(&mut self, user_id: &str) -> bool {
        let removed = self.active.remove(user_id).is_some();
        self.carets.remove(user_id);
        if !removed {
            trace!(user = %user_id, "Leave for inactive participant ignored");
        }
        removed
    }

    /// Replace one participant's caret offset
    pub fn apply_caret(&mut self, user_id: String, offset: usize) -> bool {
        self.carets.insert(user_id, offset) != Some(offset)
    }

    pub fn is_active(&self, user_id: &str) -> bool {
        self.active.contains_key(user_id)
    }

    pub fn color_of(&self, user_id: &str) -> Option<u32> {
        self.active.get(user_id).copied()
    }

    pub fn caret_of(&self, user_id: &str) -> Option<usize> {
        self.carets.get(user_id).copied()
    }

    /// Number of active participants
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active participants ordered by user id
    pub fn participants(&self) -> Vec<Participant> {
        self.active
            .iter()
            .map(|(id, color)| Participant {
                user_id: id.clone(),
                color: *color,
                caret: self.carets.get(id).copied(),
            })
            .collect()
    }

    /// Record where the local caret is
    pub fn set_local_caret(&mut self, offset: usize) {
        self.local_caret = Some(offset);
    }

    pub fn local_caret(&self) -> Option<usize> {
        self.local_caret
    }

    /// Local caret offset if it moved since it was last taken
    pub fn take_local_caret_update(&mut self) -> Option<usize> {
        let caret = self.local_caret?;
        if self.last_sent_caret == Some(caret) {
            return None;
        }
        self.last_sent_caret = Some(caret);
        Some(caret)
    }

    /// Forget what was sent, so the next probe reannounces the caret
    ///
    /// Called after a reconnect; the relay has no memory of earlier carets.
    pub fn reset_local_caret_sent(&mut self) {
        self.last_sent_caret = None;
    }
}
