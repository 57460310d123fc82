//! Cotext Core - Replicated text engine for collaborative plain-text editing
//!
//! This is the Rust core of Cotext, compiled to both native and WASM.
//! It implements:
//! - A fractional-position sequence CRDT for plain text
//! - A diff engine turning "the text is now X" into operations
//! - Presence tracking (participants, colors, carets)
//! - The JSON wire protocol and a batching sync session
//!
//! # Examples
//!
//! ```rust
//! use cotext_core::crdt::text::TextReplica;
//!
//! let mut alice = TextReplica::new("alice".to_string());
//! let mut bob = TextReplica::new("bob".to_string());
//!
//! for op in alice.local_edit("Hello World") {
//!     bob.apply(&op);
//! }
//! assert_eq!(bob.text(), "Hello World");
//! ```

pub mod awareness;
pub mod config;
pub mod crdt;
pub mod error;
pub mod protocol;
pub mod sync;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-exports for convenience
pub use config::{AllocatorConfig, SessionConfig};
pub use crdt::text::{CharacterStore, Operation, Position, PositionAllocator, TextReplica};
pub use error::{Result, SyncError};
pub use sync::{ConnectionState, SyncSession};

/// Replica (participant) identifier type
pub type SiteId = String;

/// Character identifier type
pub type CharId = String;

/// Document identifier type
pub type DocumentId = String;
