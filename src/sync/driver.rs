//! Session driver
//!
//! Runs a [`SyncSession`] over a [`Transport`] on a tokio task. The driver
//! owns all session state; the application talks to it through a cloneable
//! [`SessionHandle`] and listens to [`SessionEvent`]s.
//!
//! One task serves everything, so the replica is never touched from two
//! places at once:
//!
//! - inbound frames are decoded and applied, yielding between the
//!   operations of a batch
//! - the flush timer sends the outgoing buffer as one batch while `Open`
//! - the caret timer announces the local caret when it moved
//! - a closed connection is reopened after a capped exponential backoff

use super::session::SyncSession;
use super::state::ConnectionState;
use super::surface::EditorSurface;
use super::transport::{Connection, Transport};
use crate::awareness::Participant;
use crate::config::SessionConfig;
use crate::crdt::text::{ApplyOutcome, Operation};
use crate::error::{Result, SyncError};
use crate::protocol::{decode_frame, encode_batch, encode_caret, InboundMessage};
use crate::{CharId, DocumentId, SiteId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};

/// Notifications for the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(ConnectionState),
    PresenceChanged(Vec<Participant>),
    /// A remote operation changed the replica
    RemoteApplied { char_id: CharId, outcome: ApplyOutcome },
}

enum Command {
    Edit {
        text: String,
        reply: oneshot::Sender<usize>,
    },
    SetCaret(usize),
    Text(oneshot::Sender<String>),
    SurfaceText(oneshot::Sender<String>),
    Participants(oneshot::Sender<Vec<Participant>>),
    State(oneshot::Sender<ConnectionState>),
    Pending(oneshot::Sender<usize>),
    Shutdown(oneshot::Sender<Vec<Operation>>),
}

/// Handle to a running session
///
/// Cloning is cheap; every clone talks to the same driver task. Once the
/// driver has shut down every request fails with
/// [`SyncError::SessionClosed`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Edit { .. } => "Edit",
            Command::SetCaret(_) => "SetCaret",
            Command::Text(_) => "Text",
            Command::SurfaceText(_) => "SurfaceText",
            Command::Participants(_) => "Participants",
            Command::State(_) => "State",
            Command::Pending(_) => "Pending",
            Command::Shutdown(_) => "Shutdown",
        };
        f.write_str(name)
    }
}

impl SessionHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .map_err(|_| SyncError::SessionClosed)?;
        rx.await.map_err(|_| SyncError::SessionClosed)
    }

    /// Report the full text the editor now shows
    ///
    /// Returns the number of operations the edit produced.
    pub async fn edit(&self, text: impl Into<String>) -> Result<usize> {
        let text = text.into();
        self.request(|reply| Command::Edit { text, reply }).await
    }

    /// Report where the local caret is, counted in stored characters
    pub fn set_caret(&self, offset: usize) -> Result<()> {
        self.commands
            .send(Command::SetCaret(offset))
            .map_err(|_| SyncError::SessionClosed)
    }

    /// The replica's visible text
    pub async fn text(&self) -> Result<String> {
        self.request(Command::Text).await
    }

    /// What the editor surface currently shows
    pub async fn surface_text(&self) -> Result<String> {
        self.request(Command::SurfaceText).await
    }

    pub async fn participants(&self) -> Result<Vec<Participant>> {
        self.request(Command::Participants).await
    }

    pub async fn state(&self) -> Result<ConnectionState> {
        self.request(Command::State).await
    }

    /// Number of local operations not yet sent
    pub async fn pending(&self) -> Result<usize> {
        self.request(Command::Pending).await
    }

    /// Stop the session
    ///
    /// Flushes once more if configured and open, closes the connection and
    /// returns the operations that were never sent.
    pub async fn shutdown(self) -> Result<Vec<Operation>> {
        self.request(Command::Shutdown).await
    }
}

/// Reconnect delay that doubles up to a cap
#[derive(Debug, Clone)]
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Drives one document session on a tokio task
pub struct SessionDriver {
    session: SyncSession,
    transport: Arc<dyn Transport>,
    surface: Box<dyn EditorSurface + Send>,
    config: SessionConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SessionEvent>,
    connection: Option<Box<dyn Connection>>,
    reconnect_at: Option<Instant>,
    backoff: Backoff,
}

impl SessionDriver {
    /// Validate `config`, start the driver task and connect
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        document_id: DocumentId,
        site_id: SiteId,
        config: SessionConfig,
        surface: Box<dyn EditorSurface + Send>,
    ) -> Result<(SessionHandle, mpsc::UnboundedReceiver<SessionEvent>)> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let driver = SessionDriver {
            session: SyncSession::new(document_id, site_id, &config),
            transport,
            surface,
            backoff: Backoff::new(config.reconnect_initial_delay(), config.reconnect_max_delay()),
            config,
            commands: command_rx,
            events: event_tx,
            connection: None,
            reconnect_at: Some(Instant::now()),
        };
        tokio::spawn(driver.run());

        Ok((SessionHandle { commands: command_tx }, event_rx))
    }

    async fn run(mut self) {
        let span = info_span!(
            "sync_session",
            document = %self.session.document_id(),
            site = %self.session.site_id(),
            transport = self.transport.transport_type()
        );
        async move {
            info!("Starting session");
            let mut flush = interval(self.config.flush_interval());
            let mut caret = interval(self.config.caret_probe_interval());
            flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
            caret.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    frame = next_frame(&mut self.connection) => {
                        self.handle_frame(frame).await;
                    }

                    _ = wait_until(self.reconnect_at) => {
                        self.connect().await;
                    }

                    _ = flush.tick() => {
                        self.flush().await;
                    }

                    _ = caret.tick() => {
                        self.probe_caret().await;
                    }

                    command = self.commands.recv() => match command {
                        Some(command) => {
                            if let Some(reply) = self.handle_command(command) {
                                let unsent = self.shutdown().await;
                                let _ = reply.send(unsent);
                                break;
                            }
                        }
                        None => {
                            // Every handle was dropped
                            self.shutdown().await;
                            break;
                        }
                    }
                }
            }
            info!("Session stopped");
        }
        .instrument(span)
        .await
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    fn set_state(&mut self, next: ConnectionState) {
        match self.session.transition(next) {
            Ok(()) => self.emit(SessionEvent::StateChanged(next)),
            Err(e) => warn!(error = %e, "Ignoring state change"),
        }
    }

    async fn connect(&mut self) {
        self.reconnect_at = None;
        self.set_state(ConnectionState::Connecting);

        let result = self
            .transport
            .connect(self.session.document_id(), self.session.site_id())
            .await;
        match result {
            Ok(connection) => {
                self.connection = Some(connection);
                self.backoff.reset();
                self.set_state(ConnectionState::Open);
            }
            Err(e) => {
                self.set_state(ConnectionState::Closed);
                let delay = self.backoff.next_delay();
                warn!(error = %e, retry_in_ms = delay.as_millis() as u64, "Connect failed");
                self.reconnect_at = Some(Instant::now() + delay);
            }
        }
    }

    fn connection_lost(&mut self, reason: &str) {
        self.connection = None;
        self.set_state(ConnectionState::Closed);
        let delay = self.backoff.next_delay();
        info!(reason, retry_in_ms = delay.as_millis() as u64, "Connection lost");
        self.reconnect_at = Some(Instant::now() + delay);
    }

    async fn handle_frame(&mut self, frame: Option<Result<String>>) {
        let text = match frame {
            Some(Ok(text)) => text,
            Some(Err(SyncError::Protocol(reason))) => {
                warn!(%reason, "Dropping unreadable frame");
                return;
            }
            Some(Err(e)) => return self.connection_lost(&e.to_string()),
            None => return self.connection_lost("closed by peer"),
        };

        let message = match decode_frame(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                return;
            }
        };

        match message {
            InboundMessage::Batch(ops) => {
                debug!(ops = ops.len(), "Applying remote batch");
                for op in &ops {
                    self.apply_remote(op);
                    tokio::task::yield_now().await;
                }
            }
            InboundMessage::Operation(op) => self.apply_remote(&op),
            presence => {
                if self.session.handle_presence(presence) {
                    self.emit(SessionEvent::PresenceChanged(self.session.participants()));
                }
            }
        }
    }

    fn apply_remote(&mut self, op: &Operation) {
        let outcome = self.session.apply_remote(op, &mut *self.surface);
        if outcome.changed() {
            self.emit(SessionEvent::RemoteApplied {
                char_id: op.char_id().to_string(),
                outcome,
            });
        }
    }

    async fn flush(&mut self) {
        if self.connection.is_none() {
            return;
        }
        let Some(batch) = self.session.take_batch() else {
            return;
        };

        let frame = match encode_batch(&batch) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode batch");
                self.session.requeue(batch);
                return;
            }
        };

        let result = match self.connection.as_mut() {
            Some(connection) => connection.send(frame).await,
            None => return self.session.requeue(batch),
        };
        match result {
            Ok(()) => debug!(ops = batch.len(), "Flushed batch"),
            Err(e) => {
                // The batch goes out again with the next open connection
                self.session.requeue(batch);
                self.connection_lost(&e.to_string());
            }
        }
    }

    async fn probe_caret(&mut self) {
        if self.connection.is_none() {
            return;
        }
        let Some(offset) = self.session.take_caret_update() else {
            return;
        };
        let frame = match encode_caret(self.session.site_id(), offset) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode caret");
                return;
            }
        };

        let result = match self.connection.as_mut() {
            Some(connection) => connection.send(frame).await,
            None => return,
        };
        if let Err(e) = result {
            self.connection_lost(&e.to_string());
        }
    }

    /// Serve one command; a shutdown request is handed back to the loop
    fn handle_command(&mut self, command: Command) -> Option<oneshot::Sender<Vec<Operation>>> {
        match command {
            Command::Edit { text, reply } => {
                let produced = self.session.local_edit(&text);
                self.surface.commit_local(&self.session.characters());
                let _ = reply.send(produced);
            }
            Command::SetCaret(offset) => self.session.set_local_caret(offset),
            Command::Text(reply) => {
                let _ = reply.send(self.session.text().to_string());
            }
            Command::SurfaceText(reply) => {
                let _ = reply.send(self.surface.text());
            }
            Command::Participants(reply) => {
                let _ = reply.send(self.session.participants());
            }
            Command::State(reply) => {
                let _ = reply.send(self.session.state());
            }
            Command::Pending(reply) => {
                let _ = reply.send(self.session.pending().len());
            }
            Command::Shutdown(reply) => return Some(reply),
        }
        None
    }

    async fn shutdown(&mut self) -> Vec<Operation> {
        if self.config.flush_on_shutdown {
            self.flush().await;
        }

        if let Some(mut connection) = self.connection.take() {
            self.set_state(ConnectionState::Closing);
            if let Err(e) = connection.close().await {
                warn!(error = %e, "Failed to close connection");
            }
            self.set_state(ConnectionState::Closed);
        }
        self.reconnect_at = None;

        let unsent = self.session.drain_pending();
        info!(unsent = unsent.len(), "Session shut down");
        unsent
    }
}

async fn next_frame(connection: &mut Option<Box<dyn Connection>>) -> Option<Result<String>> {
    match connection {
        Some(connection) => connection.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
