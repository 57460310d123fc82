//! Replicated text built from fractionally positioned characters
//!
//! Every inserted grapheme gets an immutable [`Position`]. Positions, with
//! the character id breaking ties, are totally ordered, so sorting the live
//! characters yields the same text on every replica regardless of the order
//! operations arrived in.
//!
//! # Pieces
//!
//! - [`PositionAllocator`] mints positions between two neighbours
//! - [`CharacterStore`] keeps every character, tombstones included, and
//!   derives the visible text
//! - [`diff`] turns "the text is now X" into insert/delete operations
//! - [`TextReplica`] ties a store to this site's allocator
//!
//! # Example
//!
//! ```rust
//! use cotext_core::crdt::text::TextReplica;
//!
//! let mut a = TextReplica::new("a".to_string());
//! let mut b = TextReplica::new("b".to_string());
//!
//! for op in a.local_edit("ab") {
//!     b.apply(&op);
//! }
//!
//! // Concurrent edits at the same spot
//! let from_a = a.local_edit("aXb");
//! let from_b = b.local_edit("a");
//! for op in &from_b { a.apply(op); }
//! for op in &from_a { b.apply(op); }
//!
//! assert_eq!(a.text(), "aX");
//! assert_eq!(a.text(), b.text());
//! ```

mod allocator;
mod character;
mod diff;
mod op;
mod position;
mod replica;
mod store;

pub use allocator::{LamportClock, PositionAllocator, DEFAULT_BASE, DEFAULT_BOUNDARY};
pub use character::Character;
pub use diff::{diff, ChangedRegion};
pub use op::{ApplyOutcome, DeleteOp, InsertOp, Operation};
pub use position::{Position, MAX_DIGIT};
pub use replica::TextReplica;
pub use store::CharacterStore;
