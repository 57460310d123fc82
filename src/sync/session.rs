//! SyncSession: the synchronous heart of a document session
//!
//! Owns the replica, the presence map, the outgoing buffer and the
//! connection state. It performs no I/O; a driver decides when to flush,
//! feeds it inbound messages and moves it through connection states.
//!
//! # Outgoing operations
//!
//! Local edits are diffed, applied to the replica and appended to an
//! unbounded buffer. [`SyncSession::take_batch`] hands the whole buffer out
//! only while the connection is `Open`; operations produced while offline
//! wait for the next `Open`.
//!
//! # Inbound operations
//!
//! Each operation is applied to the replica and, when it changed something
//! visible, spliced into the [`EditorSurface`]. A delete's offset is read
//! before the tombstone is set, since tombstones have no visible offset.
//! If a splice fails the surface is replaced with the replica's text.

use super::state::ConnectionState;
use super::surface::EditorSurface;
use crate::awareness::{Participant, Presence};
use crate::config::SessionConfig;
use crate::crdt::text::{ApplyOutcome, Operation, TextReplica};
use crate::error::Result;
use crate::protocol::{InboundMessage, UserAction};
use crate::{DocumentId, SiteId};
use tracing::{debug, info, trace, warn};

/// What handling one inbound message changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageEffect {
    /// Operations that changed the replica
    pub applied: usize,
    pub presence_changed: bool,
}

/// State of one participant's session on one document
///
/// # Example
///
/// ```rust
/// use cotext_core::sync::{ConnectionState, RopeSurface, SyncSession};
/// use cotext_core::SessionConfig;
///
/// let config = SessionConfig::default();
/// let mut alice = SyncSession::new("doc".into(), "alice".into(), &config);
/// let mut bob = SyncSession::new("doc".into(), "bob".into(), &config);
/// let mut bob_view = RopeSurface::new();
///
/// alice.local_edit("hi");
/// assert!(alice.take_batch().is_none()); // not connected yet
///
/// alice.transition(ConnectionState::Connecting).unwrap();
/// alice.transition(ConnectionState::Open).unwrap();
/// for op in alice.take_batch().unwrap() {
///     bob.apply_remote(&op, &mut bob_view);
/// }
/// assert_eq!(bob.text(), "hi");
/// ```
#[derive(Debug, Clone)]
pub struct SyncSession {
    document_id: DocumentId,
    replica: TextReplica,
    presence: Presence,
    state: ConnectionState,
    outgoing: Vec<Operation>,

    /// Text the editor last showed, the `prev` side of the next diff
    last_text: String,
}

impl SyncSession {
    /// Create a session in the `Closed` state with an empty replica
    pub fn new(document_id: DocumentId, site_id: SiteId, config: &SessionConfig) -> Self {
        Self {
            document_id,
            replica: TextReplica::with_config(site_id.clone(), &config.allocator),
            presence: Presence::new(site_id, config.palette_size),
            state: ConnectionState::Closed,
            outgoing: Vec::new(),
            last_text: String::new(),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn site_id(&self) -> &str {
        self.replica.site_id()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Move the connection state machine
    ///
    /// Entering `Open` makes the local caret due for reannouncement.
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        let previous = self.state;
        self.state = previous.transition(next)?;
        info!(
            document = %self.document_id,
            from = %previous,
            state = %next,
            "Connection state changed"
        );
        if next.is_open() {
            self.presence.reset_local_caret_sent();
        }
        Ok(())
    }

    /// Record a local edit
    ///
    /// `next` is the full text the editor now shows. Returns the number of
    /// operations buffered for sending.
    pub fn local_edit(&mut self, next: &str) -> usize {
        let ops = self.replica.edit(&self.last_text, next);
        self.last_text = self.replica.text().to_string();
        let count = ops.len();
        self.outgoing.extend(ops);
        if count > 0 {
            trace!(ops = count, pending = self.outgoing.len(), "Buffered local operations");
        }
        count
    }

    /// Operations not yet handed out for sending
    pub fn pending(&self) -> &[Operation] {
        &self.outgoing
    }

    /// The whole outgoing buffer, if the connection is open and it is non-empty
    pub fn take_batch(&mut self) -> Option<Vec<Operation>> {
        if !self.state.is_open() || self.outgoing.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.outgoing))
    }

    /// Put a batch back at the front of the buffer after a failed send
    pub fn requeue(&mut self, mut batch: Vec<Operation>) {
        batch.append(&mut self.outgoing);
        self.outgoing = batch;
    }

    /// Drain the outgoing buffer regardless of connection state
    pub fn drain_pending(&mut self) -> Vec<Operation> {
        std::mem::take(&mut self.outgoing)
    }

    /// Apply one remote operation and splice its visible effect
    pub fn apply_remote(&mut self, op: &Operation, surface: &mut dyn EditorSurface) -> ApplyOutcome {
        let outcome = match op {
            Operation::Insert(insert) => {
                let outcome = self.replica.apply(op);
                if outcome.changed() {
                    if let Some(offset) = self.replica.relative_index(&insert.char_id) {
                        if let Err(e) = surface.insert(offset, &insert.value) {
                            self.resync(surface, &e);
                        }
                    }
                }
                outcome
            }
            Operation::Delete(delete) => {
                let offset = self.replica.relative_index(&delete.char_id);
                let outcome = self.replica.apply(op);
                if let (true, Some(offset)) = (outcome.changed(), offset) {
                    if let Err(e) = surface.delete(offset) {
                        self.resync(surface, &e);
                    }
                }
                outcome
            }
        };

        if outcome.changed() {
            self.last_text = self.replica.text().to_string();
            debug!(char_id = %op.char_id(), ?outcome, "Applied remote operation");
        } else {
            trace!(char_id = %op.char_id(), "Remote operation had no effect");
        }
        outcome
    }

    fn resync(&self, surface: &mut dyn EditorSurface, error: &dyn std::fmt::Display) {
        warn!(document = %self.document_id, error = %error, "Splice failed, replacing editor contents");
        surface.replace_all(&self.characters());
    }

    /// Handle a decoded inbound message
    ///
    /// Batches are applied in order, without yielding; drivers that need to
    /// yield between operations call [`SyncSession::apply_remote`] per
    /// element instead.
    pub fn handle_message(&mut self, message: InboundMessage, surface: &mut dyn EditorSurface) -> MessageEffect {
        let mut effect = MessageEffect::default();
        match message {
            InboundMessage::Batch(ops) => {
                effect.applied = ops
                    .iter()
                    .filter(|op| self.apply_remote(op, surface).changed())
                    .count();
            }
            InboundMessage::Operation(op) => {
                if self.apply_remote(&op, surface).changed() {
                    effect.applied = 1;
                }
            }
            other => effect.presence_changed = self.handle_presence(other),
        }
        effect
    }

    /// Apply a presence message; returns whether presence changed
    ///
    /// Operations are ignored here.
    pub fn handle_presence(&mut self, message: InboundMessage) -> bool {
        match message {
            InboundMessage::CurrentUsers(users) => {
                self.presence
                    .apply_current_users(users.into_iter().map(|u| u.into_parts()));
                true
            }
            InboundMessage::UserEvent(event) => {
                let color = event.color();
                match event.action {
                    UserAction::Join => self.presence.apply_join(event.user_id, color),
                    UserAction::Leave => self.presence.apply_leave(&event.user_id),
                }
            }
            InboundMessage::CaretUpdate(caret) => {
                self.presence.apply_caret(caret.user_id, caret.offset)
            }
            InboundMessage::Batch(_) | InboundMessage::Operation(_) => false,
        }
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.presence.participants()
    }

    /// Record the local caret offset, in stored characters, for the next probe
    pub fn set_local_caret(&mut self, offset: usize) {
        self.presence.set_local_caret(offset);
    }

    /// Local caret offset to announce, if it moved and the connection is open
    pub fn take_caret_update(&mut self) -> Option<usize> {
        if !self.state.is_open() {
            return None;
        }
        self.presence.take_local_caret_update()
    }

    /// Values of the live characters, in order; the unit of every offset
    pub fn characters(&self) -> Vec<&str> {
        self.replica
            .store()
            .live_characters()
            .map(|c| c.value.as_str())
            .collect()
    }

    /// The replica's visible text
    pub fn text(&self) -> &str {
        self.replica.text()
    }

    /// Text the editor was last known to show
    pub fn last_text(&self) -> &str {
        &self.last_text
    }

    pub fn replica(&self) -> &TextReplica {
        &self.replica
    }
}
