//! WASM bindings for Cotext
//!
//! This module provides JavaScript-friendly bindings for the replicated
//! text engine. The browser keeps its own websocket; frames cross the
//! boundary as JSON strings.

#[cfg(feature = "wasm")]
pub mod bindings;

#[cfg(feature = "wasm")]
pub mod utils;

// Re-export main types
#[cfg(feature = "wasm")]
pub use bindings::{WasmReplica, WasmSession};
