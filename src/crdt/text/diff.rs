//! Diff Engine: turns a before/after text pair into operations
//!
//! The editor only reports "the text is now X". The diff engine finds the
//! single changed region by trimming the common prefix and suffix, then
//! emits deletes for the removed characters and inserts for the new ones.
//! Every operation is applied to the store as it is emitted, so the
//! positions of later inserts are computed against the up-to-date live
//! sequence.
//!
//! # Units
//!
//! Offsets count stored characters. This replica inserts one grapheme
//! cluster per character, but stored characters do not always form one
//! grapheme each: concurrent `"\r"` and `"\n"` inserts join into one
//! cluster, and peers may send a lone combining mark as its own character.
//! The old side of the diff is therefore the store's live characters, never
//! a re-segmentation of the old text. The new text reuses those character
//! boundaries across its unchanged head and tail; only the text in between
//! is split into graphemes.

use super::allocator::PositionAllocator;
use super::op::Operation;
use super::store::CharacterStore;
use crate::CharId;
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

/// Changed region between two character sequences
///
/// `old_end` and `new_end` are exclusive. Characters `old[start..old_end]`
/// were replaced by `new[start..new_end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedRegion {
    pub start: usize,
    pub old_end: usize,
    pub new_end: usize,
}

impl ChangedRegion {
    /// Locate the changed region between `old` and `new`
    pub fn between(old: &[&str], new: &[&str]) -> Self {
        let start = old
            .iter()
            .zip(new.iter())
            .take_while(|(a, b)| a == b)
            .count();

        // The suffix scan never crosses the prefix
        let mut old_end = old.len();
        let mut new_end = new.len();
        while old_end > start && new_end > start && old[old_end - 1] == new[new_end - 1] {
            old_end -= 1;
            new_end -= 1;
        }

        Self {
            start,
            old_end,
            new_end,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.old_end && self.start == self.new_end
    }
}

/// Compute and apply the operations that turn `prev` into `next`
///
/// `prev` must be the text the store currently materializes; when it is not,
/// the store wins and the mismatch is logged. Deletes come first,
/// right-to-left, then inserts left-to-right. The returned operations are
/// already applied to `store`; the caller only has to ship them.
///
/// # Example
///
/// ```rust
/// use cotext_core::crdt::text::{diff, CharacterStore, PositionAllocator};
///
/// let mut store = CharacterStore::new();
/// let mut alloc = PositionAllocator::new("me".to_string());
///
/// let ops = diff("", "hi", &mut store, &mut alloc);
/// assert_eq!(ops.len(), 2);
/// assert_eq!(store.text(), "hi");
///
/// let ops = diff("hi", "hoi", &mut store, &mut alloc);
/// assert_eq!(ops.len(), 1);
/// assert_eq!(store.text(), "hoi");
/// ```
pub fn diff(
    prev: &str,
    next: &str,
    store: &mut CharacterStore,
    allocator: &mut PositionAllocator,
) -> Vec<Operation> {
    if prev != store.text() {
        warn!(
            prev_len = prev.len(),
            store_len = store.text().len(),
            "Previous text differs from the store, diffing against the store"
        );
    }

    let new: Vec<&str>;
    let (region, doomed) = {
        let old: Vec<&str> = store.live_characters().map(|c| c.value.as_str()).collect();
        new = align_units(&old, next);
        let region = ChangedRegion::between(&old, &new);
        let doomed: Vec<CharId> = store.live_ids()[region.start..region.old_end].to_vec();
        (region, doomed)
    };

    if region.is_empty() {
        return Vec::new();
    }

    debug!(
        start = region.start,
        deleted = region.old_end - region.start,
        inserted = region.new_end - region.start,
        "Diffing local edit"
    );

    let mut ops = Vec::with_capacity(doomed.len() + region.new_end - region.start);

    // Right to left, so lower offsets stay valid
    for char_id in doomed.into_iter().rev() {
        let op = Operation::delete(char_id);
        store.apply(&op);
        ops.push(op);
    }

    for (offset, value) in new
        .iter()
        .enumerate()
        .take(region.new_end)
        .skip(region.start)
    {
        let prev_pos = match offset {
            0 => None,
            _ => store.live_at(offset - 1).map(|c| c.position.clone()),
        };
        let next_pos = store.live_at(offset).map(|c| c.position.clone());
        let position = allocator.generate_between(prev_pos.as_ref(), next_pos.as_ref());

        let op = Operation::insert(Uuid::new_v4().to_string(), (*value).to_string(), position);
        store.apply(&op);
        ops.push(op);
    }

    ops
}

/// Split `next` into units that line up with the stored characters `old`
///
/// The head and tail of `next` that still spell out whole stored characters
/// keep those boundaries; the rest is split into grapheme clusters. The
/// units always concatenate back to `next`.
fn align_units<'n>(old: &[&str], next: &'n str) -> Vec<&'n str> {
    let mut head = 0;
    let mut head_units = 0;
    for unit in old {
        if unit.is_empty() || !next[head..].starts_with(unit) {
            break;
        }
        head += unit.len();
        head_units += 1;
    }

    // The tail never reaches back into the head
    let mut tail = next.len();
    let mut tail_units = 0;
    for unit in old[head_units..].iter().rev() {
        if unit.is_empty() || tail - head < unit.len() || !next[head..tail].ends_with(unit) {
            break;
        }
        tail -= unit.len();
        tail_units += 1;
    }

    let mut units = Vec::with_capacity(head_units + tail_units + (tail - head));
    let mut at = 0;
    for unit in &old[..head_units] {
        units.push(&next[at..at + unit.len()]);
        at += unit.len();
    }
    units.extend(next[head..tail].graphemes(true));
    at = tail;
    for unit in &old[old.len() - tail_units..] {
        units.push(&next[at..at + unit.len()]);
        at += unit.len();
    }
    units
}
