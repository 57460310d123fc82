//! CRDT (Conflict-free Replicated Data Types) implementations
//!
//! Replicas converge without coordination because every operation is
//! commutative and idempotent, and every character carries a position drawn
//! from a dense total order.
//!
//! # References
//!
//! - "A comprehensive study of CRDTs" by Marc Shapiro et al.
//! - "Logoot: A Scalable Optimistic Replication Algorithm for Collaborative
//!   Editing on P2P Networks" (Weiss, Urso, Molli)

pub mod text;

pub use text::{CharacterStore, Operation, Position, PositionAllocator, TextReplica};
