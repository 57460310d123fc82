//! Synchronization session layer
//!
//! - [`ConnectionState`]: the connection lifecycle state machine
//! - [`SyncSession`]: batching, inbound application and presence, no I/O
//! - [`EditorSurface`]: the rendering boundary remote edits are spliced into
//! - [`Transport`] / [`Connection`]: duplex text-frame connections
//! - [`SessionDriver`]: runs a session over a transport on a tokio task
//!
//! The state machine, the session and the surface are always available;
//! everything async sits behind the `runtime` feature and the websocket
//! transport behind `websocket`.

mod session;
mod state;
mod surface;

#[cfg(feature = "runtime")]
mod driver;
#[cfg(feature = "runtime")]
mod memory;
#[cfg(feature = "runtime")]
mod transport;
#[cfg(feature = "websocket")]
mod ws;

pub use session::{MessageEffect, SyncSession};
pub use state::ConnectionState;
pub use surface::{EditorSurface, RopeSurface, SurfaceError};

#[cfg(feature = "runtime")]
pub use driver::{SessionDriver, SessionEvent, SessionHandle};
#[cfg(feature = "runtime")]
pub use memory::{MemoryConnection, MemoryRelay};
#[cfg(feature = "runtime")]
pub use transport::{Connection, Transport};
#[cfg(feature = "websocket")]
pub use ws::{WsConnection, WsTransport};
