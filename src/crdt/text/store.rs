//! CharacterStore: every character ever inserted, and the views derived from it
//!
//! The store is the single owner of replica state. It holds tombstones
//! forever and derives three views on demand:
//!
//! - **sorted**: all character ids in position order
//! - **live**: the sorted ids without tombstones
//! - **text**: the concatenated values of the live characters
//!
//! Each view is cached in a `OnceCell` owned by the store. A mutation either
//! patches a cached view in place (sorted and live stay ordered with a
//! binary-search insert or remove) or clears it so the next read rebuilds
//! it. A view is therefore never stale across a call boundary.
//!
//! Characters are ordered by position, then by id. Positions are unique as
//! long as every live session mints under its own site id; two sessions
//! sharing one (a user with two tabs open) can mint equal positions, and the
//! id keeps the order total on every replica.

use super::character::Character;
use super::op::{ApplyOutcome, DeleteOp, InsertOp, Operation};
use crate::CharId;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Replicated character store
///
/// Applying the same set of operations in any order yields the same
/// [`text`](CharacterStore::text) on every replica.
///
/// # Example
///
/// ```rust
/// use cotext_core::crdt::text::{CharacterStore, Operation, Position};
///
/// let mut store = CharacterStore::new();
/// let b = Operation::insert("b".into(), "b".into(), Position::new(vec![20], "s".into(), 2));
/// let a = Operation::insert("a".into(), "a".into(), Position::new(vec![10], "s".into(), 1));
///
/// // Arrival order does not matter
/// store.apply(&b);
/// store.apply(&a);
/// assert_eq!(store.text(), "ab");
///
/// store.apply(&Operation::delete("a".into()));
/// assert_eq!(store.text(), "b");
/// assert_eq!(store.relative_index("b"), Some(0));
/// assert_eq!(store.relative_index("a"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CharacterStore {
    /// Every character ever inserted, tombstones included
    characters: HashMap<CharId, Character>,

    /// All ids in position order
    sorted: OnceCell<Vec<CharId>>,

    /// Non-deleted ids in position order
    live: OnceCell<Vec<CharId>>,

    /// Concatenated live values
    text: OnceCell<String>,
}

impl CharacterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an operation
    ///
    /// Inserts for known ids and deletes for unknown or already deleted ids
    /// are no-ops. A delete that arrives before its insert is dropped; the
    /// character stays live once the insert shows up.
    pub fn apply(&mut self, op: &Operation) -> ApplyOutcome {
        match op {
            Operation::Insert(insert) => self.insert(insert),
            Operation::Delete(delete) => self.delete(delete),
        }
    }

    fn insert(&mut self, op: &InsertOp) -> ApplyOutcome {
        if self.characters.contains_key(&op.char_id) {
            trace!(char_id = %op.char_id, "Duplicate insert ignored");
            return ApplyOutcome::Unchanged;
        }

        let characters = &self.characters;
        let key = (&op.position, &op.char_id);
        let before = |id: &CharId| (&characters[id].position, id) < key;

        if let Some(sorted) = self.sorted.get_mut() {
            let idx = sorted.partition_point(before);
            sorted.insert(idx, op.char_id.clone());
        }
        if let Some(live) = self.live.get_mut() {
            let idx = live.partition_point(before);
            live.insert(idx, op.char_id.clone());
        }
        self.text.take();

        self.characters.insert(
            op.char_id.clone(),
            Character::new(op.char_id.clone(), op.value.clone(), op.position.clone()),
        );
        ApplyOutcome::Inserted
    }

    fn delete(&mut self, op: &DeleteOp) -> ApplyOutcome {
        let Some(character) = self.characters.get_mut(&op.char_id) else {
            debug!(char_id = %op.char_id, "Delete for unknown character dropped");
            return ApplyOutcome::Unchanged;
        };
        if !character.mark_deleted() {
            return ApplyOutcome::Unchanged;
        }

        let characters = &self.characters;
        let target = (&characters[&op.char_id].position, &op.char_id);
        if let Some(live) = self.live.get_mut() {
            if let Ok(idx) = live.binary_search_by(|id| (&characters[id].position, id).cmp(&target)) {
                live.remove(idx);
            }
        }
        self.text.take();
        ApplyOutcome::Deleted
    }

    fn sorted_ids(&self) -> &[CharId] {
        self.sorted.get_or_init(|| {
            let mut ids: Vec<CharId> = self.characters.keys().cloned().collect();
            ids.sort_by(|a, b| {
                (&self.characters[a].position, a).cmp(&(&self.characters[b].position, b))
            });
            ids
        })
    }

    /// Ids of live characters in position order
    pub fn live_ids(&self) -> &[CharId] {
        self.live.get_or_init(|| {
            self.sorted_ids()
                .iter()
                .filter(|id| !self.characters[*id].is_deleted())
                .cloned()
                .collect()
        })
    }

    /// All characters, tombstones included, in position order
    pub fn ordered_characters(&self) -> impl Iterator<Item = &Character> + '_ {
        self.sorted_ids().iter().map(move |id| &self.characters[id])
    }

    /// Live characters in position order
    pub fn live_characters(&self) -> impl Iterator<Item = &Character> + '_ {
        self.live_ids().iter().map(move |id| &self.characters[id])
    }

    /// Live character at a visible offset
    pub fn live_at(&self, index: usize) -> Option<&Character> {
        self.live_ids().get(index).map(|id| &self.characters[id])
    }

    /// The visible text
    pub fn text(&self) -> &str {
        self.text
            .get_or_init(|| self.live_characters().map(|c| c.value.as_str()).collect())
    }

    /// Visible offset of a live character
    ///
    /// Returns `None` for unknown ids and for tombstones; callers treat that
    /// as "no visible effect".
    pub fn relative_index(&self, char_id: &str) -> Option<usize> {
        let character = self.characters.get(char_id)?;
        if character.is_deleted() {
            return None;
        }
        let target = (&character.position, &character.id);
        self.live_ids()
            .binary_search_by(|id| (&self.characters[id].position, id).cmp(&target))
            .ok()
    }

    pub fn get(&self, char_id: &str) -> Option<&Character> {
        self.characters.get(char_id)
    }

    pub fn contains(&self, char_id: &str) -> bool {
        self.characters.contains_key(char_id)
    }

    /// Number of live characters
    pub fn len(&self) -> usize {
        self.live_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of characters including tombstones
    pub fn total_len(&self) -> usize {
        self.characters.len()
    }

    /// Merge another replica's state into this one
    ///
    /// Unknown characters are adopted and tombstones win, so the merge is
    /// commutative, associative and idempotent. Returns the number of
    /// characters that changed locally.
    pub fn merge(&mut self, remote: &CharacterStore) -> usize {
        let mut changed = 0;
        for character in remote.ordered_characters() {
            let insert = Operation::insert(
                character.id.clone(),
                character.value.clone(),
                character.position.clone(),
            );
            if self.apply(&insert).changed() {
                changed += 1;
            }
            if character.is_deleted()
                && self.apply(&Operation::delete(character.id.clone())).changed()
            {
                changed += 1;
            }
        }
        changed
    }

    /// Operation log that rebuilds this store on an empty replica
    ///
    /// Inserts come in position order, followed by deletes for every
    /// tombstone.
    pub fn to_operations(&self) -> Vec<Operation> {
        let inserts = self.ordered_characters().map(|c| {
            Operation::insert(c.id.clone(), c.value.clone(), c.position.clone())
        });
        let deletes = self
            .ordered_characters()
            .filter(|c| c.is_deleted())
            .map(|c| Operation::delete(c.id.clone()));
        inserts.chain(deletes).collect()
    }
}

impl Serialize for CharacterStore {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("CharacterStore", 1)?;

        // Position order keeps snapshots stable across replicas
        let characters: Vec<&Character> = self.ordered_characters().collect();
        state.serialize_field("characters", &characters)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for CharacterStore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct StoreHelper {
            characters: Vec<Character>,
        }

        let helper = StoreHelper::deserialize(deserializer)?;

        // Caches start empty and rebuild on first read
        Ok(Self {
            characters: helper
                .characters
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
            ..Self::default()
        })
    }
}
