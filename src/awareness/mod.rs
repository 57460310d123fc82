/// Awareness - ephemeral presence of the participants in a document
///
/// Unlike the replicated text, presence is never persisted and never
/// merged. It tracks:
/// - Who is connected
/// - The color each participant is drawn with
/// - The caret offset each participant last reported
///
/// Presence travels on the same connection as text operations but never
/// touches the character store.
mod state;

pub use state::{color_index_for, Participant, Presence};

/// Default number of colors participants are spread across
pub const DEFAULT_PALETTE_SIZE: u32 = 12;
