//! Stream multiplexing over one tunnel.
//!
//! The client opens streams, the server accepts them; relays in between see
//! only the framed byte stream.

mod frame;
mod session;

pub use frame::{Cmd, Frame, MuxCodec, FRAME_HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use session::{MuxSession, MuxStream};
