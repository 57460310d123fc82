//! Error types for the replicated text engine.
//!
//! Nothing in the core is fatal: every variant here is either reported back
//! to the caller of a fallible boundary function (decoding, configuration,
//! transport I/O) or logged and degraded into a resync.

use crate::sync::ConnectionState;
use thiserror::Error;

/// Errors surfaced by the codec, configuration and session layers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// Frame did not match any known message shape.
    #[error("Malformed message: {0}")]
    Protocol(String),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A connection state change that the session state machine forbids.
    #[error("Invalid connection transition: {from} -> {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// Client connection error.
    #[error("Failed to connect to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    /// Network communication error on an established connection.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Session configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The session driver has already shut down.
    #[error("Session closed")]
    SessionClosed,
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, SyncError>;
