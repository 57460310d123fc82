//! Wire protocol
//!
//! JSON text frames exchanged with the relay:
//!
//! - `[op, op, ...]` a batch of text operations
//! - `{"type":"insert"|"delete", ...}` a single text operation
//! - `{"type":"currentUsers","users":[...]}` the full participant set
//! - `{"type":"userEvent","action":"join"|"leave","userId":...}`
//! - `{"type":"caretUpdate","data":{"userId":...,"offset":...}}`

mod message;
mod serialize;

pub use message::{
    CaretData, CaretUpdate, CurrentUsers, InboundMessage, UserAction, UserData, UserEntry,
    UserEvent, WireMessage,
};
pub use serialize::{
    decode_frame, encode_batch, encode_caret, encode_current_users, encode_message,
    encode_operation, encode_user_event,
};
