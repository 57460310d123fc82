//! In-process relay
//!
//! [`MemoryRelay`] plays the part of the document server for tests and for
//! embedding several sessions in one process. Per document it:
//!
//! - sends a new connection the `currentUsers` list, itself included
//! - replays every operation seen so far as one batch
//! - announces joins and leaves to the other users
//! - forwards every frame to all other connections of the document
//!
//! The relay can be taken offline and connections can be dropped from the
//! relay side to exercise reconnects.

use super::transport::{Connection, Transport};
use crate::crdt::text::Operation;
use crate::error::{Result, SyncError};
use crate::protocol::{
    decode_frame, encode_batch, encode_current_users, encode_user_event, InboundMessage, UserEntry,
    UserEvent,
};
use crate::DocumentId;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug)]
struct Member {
    user_id: String,
    tx: mpsc::UnboundedSender<String>,
}

#[derive(Debug, Default)]
struct Room {
    members: BTreeMap<u64, Member>,
    history: Vec<Operation>,
}

impl Room {
    fn broadcast(&self, from: u64, frame: &str, skip_user: Option<&str>) {
        for (id, member) in &self.members {
            if *id == from || skip_user == Some(member.user_id.as_str()) {
                continue;
            }
            // A closed receiver is removed when its connection drops
            let _ = member.tx.send(frame.to_string());
        }
    }

    fn has_user(&self, user_id: &str) -> bool {
        self.members.values().any(|m| m.user_id == user_id)
    }
}

#[derive(Debug, Default)]
struct RelayState {
    rooms: HashMap<DocumentId, Room>,
    next_id: u64,
    offline: bool,
}

/// Relay shared by every connection it hands out
#[derive(Debug, Clone, Default)]
pub struct MemoryRelay {
    inner: Arc<Mutex<RelayState>>,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, RelayState>> {
        self.inner
            .lock()
            .map_err(|_| SyncError::Transport("memory relay lock poisoned".to_string()))
    }

    /// Refuse new connections while `offline` is true
    pub fn set_offline(&self, offline: bool) -> Result<()> {
        self.lock()?.offline = offline;
        Ok(())
    }

    /// Close every connection to `document_id` from the relay side
    ///
    /// Returns the number of connections dropped.
    pub fn drop_connections(&self, document_id: &str) -> Result<usize> {
        let mut state = self.lock()?;
        let dropped = match state.rooms.get_mut(document_id) {
            Some(room) => std::mem::take(&mut room.members).len(),
            None => 0,
        };
        debug!(document = %document_id, dropped, "Dropped relay connections");
        Ok(dropped)
    }

    /// Every operation the relay has seen for `document_id`, in arrival order
    pub fn history(&self, document_id: &str) -> Result<Vec<Operation>> {
        Ok(self
            .lock()?
            .rooms
            .get(document_id)
            .map(|room| room.history.clone())
            .unwrap_or_default())
    }

    pub fn connection_count(&self, document_id: &str) -> Result<usize> {
        Ok(self
            .lock()?
            .rooms
            .get(document_id)
            .map_or(0, |room| room.members.len()))
    }

    fn forward(&self, document_id: &str, from: u64, frame: String) -> Result<()> {
        let message = match decode_frame(&frame) {
            Ok(message) => message,
            Err(e) => {
                warn!(document = %document_id, error = %e, "Relay dropped malformed frame");
                return Ok(());
            }
        };

        let mut state = self.lock()?;
        let room = state
            .rooms
            .get_mut(document_id)
            .filter(|room| room.members.contains_key(&from))
            .ok_or_else(|| SyncError::Transport("connection closed by relay".to_string()))?;

        match message {
            InboundMessage::Batch(ops) => room.history.extend(ops),
            InboundMessage::Operation(op) => room.history.push(op),
            _ => {}
        }
        room.broadcast(from, &frame, None);
        Ok(())
    }

    fn leave(&self, document_id: &str, id: u64) -> Result<()> {
        let mut state = self.lock()?;
        let Some(room) = state.rooms.get_mut(document_id) else {
            return Ok(());
        };
        let Some(member) = room.members.remove(&id) else {
            return Ok(());
        };
        if !room.has_user(&member.user_id) {
            let frame = encode_user_event(UserEvent::leave(member.user_id.clone()))?;
            room.broadcast(id, &frame, Some(&member.user_id));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryRelay {
    fn transport_type(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self, document_id: &str, site_id: &str) -> Result<Box<dyn Connection>> {
        let mut state = self.lock()?;
        if state.offline {
            return Err(SyncError::ConnectionFailed {
                address: format!("memory://{}", document_id),
                reason: "relay offline".to_string(),
            });
        }

        let id = state.next_id;
        state.next_id += 1;
        let (tx, rx) = mpsc::unbounded_channel();

        let room = state.rooms.entry(document_id.to_string()).or_default();
        let first_of_user = !room.has_user(site_id);
        room.members.insert(
            id,
            Member {
                user_id: site_id.to_string(),
                tx: tx.clone(),
            },
        );

        let users: BTreeSet<&str> = room.members.values().map(|m| m.user_id.as_str()).collect();
        let _ = tx.send(encode_current_users(
            users.into_iter().map(|u| UserEntry::Bare(u.to_string())).collect(),
        )?);
        if !room.history.is_empty() {
            let _ = tx.send(encode_batch(&room.history)?);
        }
        if first_of_user {
            let frame = encode_user_event(UserEvent::join(site_id.to_string(), None))?;
            room.broadcast(id, &frame, Some(site_id));
        }

        debug!(document = %document_id, site = %site_id, connection = id, "Relay accepted connection");
        Ok(Box::new(MemoryConnection {
            id,
            document_id: document_id.to_string(),
            relay: self.clone(),
            rx,
            closed: false,
        }))
    }
}

/// Client end of a [`MemoryRelay`] connection
#[derive(Debug)]
pub struct MemoryConnection {
    id: u64,
    document_id: DocumentId,
    relay: MemoryRelay,
    rx: mpsc::UnboundedReceiver<String>,
    closed: bool,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn send(&mut self, frame: String) -> Result<()> {
        if self.closed {
            return Err(SyncError::Transport("connection closed".to_string()));
        }
        self.relay.forward(&self.document_id, self.id, frame)
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<()> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.rx.close();
        self.relay.leave(&self.document_id, self.id)
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.relay.leave(&self.document_id, self.id);
        }
    }
}
