//! Transport abstractions for session connections
//!
//! A [`Transport`] opens one duplex, text-framed [`Connection`] per document
//! session. The driver only needs to send a frame, wait for the next frame
//! and close; fan-out and persistence belong to whatever sits on the other
//! end.

use async_trait::async_trait;

use crate::error::Result;

/// Opens connections to a document relay.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Get the transport type identifier (e.g. "websocket", "memory").
    fn transport_type(&self) -> &'static str;

    /// Open a connection for `site_id` on `document_id`.
    ///
    /// # Returns
    /// The open connection, or [`crate::SyncError::ConnectionFailed`].
    async fn connect(&self, document_id: &str, site_id: &str) -> Result<Box<dyn Connection>>;
}

/// One open duplex connection.
///
/// `recv` must be cancel-safe: the driver races it against its timers and
/// drops the pending future whenever a timer fires first.
#[async_trait]
pub trait Connection: Send {
    /// Send one text frame.
    async fn send(&mut self, frame: String) -> Result<()>;

    /// Wait for the next text frame.
    ///
    /// `None` means the connection is closed.
    async fn recv(&mut self) -> Option<Result<String>>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<()>;
}
