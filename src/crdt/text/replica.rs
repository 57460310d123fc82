//! TextReplica: one participant's copy of the document
//!
//! Bundles the character store with the allocator that mints this
//! replica's positions. Local edits go through [`TextReplica::local_edit`],
//! remote operations through [`TextReplica::apply`].

use super::allocator::PositionAllocator;
use super::diff::diff;
use super::op::{ApplyOutcome, Operation};
use super::store::CharacterStore;
use crate::config::AllocatorConfig;
use crate::SiteId;
use tracing::debug;

/// A replica of the replicated text
///
/// # Example
///
/// ```rust
/// use cotext_core::crdt::text::TextReplica;
///
/// let mut alice = TextReplica::new("alice".to_string());
/// let mut bob = TextReplica::new("bob".to_string());
///
/// let ops = alice.local_edit("hi");
/// for op in &ops {
///     bob.apply(op);
/// }
/// assert_eq!(bob.text(), "hi");
/// ```
#[derive(Debug, Clone)]
pub struct TextReplica {
    store: CharacterStore,
    allocator: PositionAllocator,
}

impl TextReplica {
    pub fn new(site_id: SiteId) -> Self {
        Self::with_config(site_id, &AllocatorConfig::default())
    }

    pub fn with_config(site_id: SiteId, config: &AllocatorConfig) -> Self {
        Self {
            store: CharacterStore::new(),
            allocator: PositionAllocator::with_config(site_id, config),
        }
    }

    /// Rebuild a replica for `site_id` from a snapshot
    ///
    /// The local clock restarts at the highest clock this site already used,
    /// so new positions never repeat an earlier `(site, clock)` pair.
    pub fn from_store(site_id: SiteId, config: &AllocatorConfig, store: CharacterStore) -> Self {
        let mut allocator = PositionAllocator::with_config(site_id, config);
        let used = store
            .ordered_characters()
            .filter(|c| c.position.site_id == allocator.site_id())
            .map(|c| c.position.clock)
            .max()
            .unwrap_or(0);
        allocator.advance_clock(used);
        Self { store, allocator }
    }

    pub fn site_id(&self) -> &str {
        self.allocator.site_id()
    }

    /// Diff the current text against `next` and return the applied operations
    pub fn local_edit(&mut self, next: &str) -> Vec<Operation> {
        let prev = self.store.text().to_string();
        self.edit(&prev, next)
    }

    /// Diff an explicit `prev` against `next`
    ///
    /// `prev` is normally the text the replica last materialized for the
    /// editor.
    pub fn edit(&mut self, prev: &str, next: &str) -> Vec<Operation> {
        let ops = diff(prev, next, &mut self.store, &mut self.allocator);
        if !ops.is_empty() {
            debug!(site = %self.allocator.site_id(), ops = ops.len(), "Local edit produced operations");
        }
        ops
    }

    /// Apply an operation from any replica
    pub fn apply(&mut self, op: &Operation) -> ApplyOutcome {
        self.store.apply(op)
    }

    pub fn text(&self) -> &str {
        self.store.text()
    }

    pub fn relative_index(&self, char_id: &str) -> Option<usize> {
        self.store.relative_index(char_id)
    }

    pub fn store(&self) -> &CharacterStore {
        &self.store
    }

    pub fn allocator(&self) -> &PositionAllocator {
        &self.allocator
    }
}
