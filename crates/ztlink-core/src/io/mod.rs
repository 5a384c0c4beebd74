//! I/O utilities shared by every hop role.

mod forward;
mod prefixed;

pub use forward::{forward_bidirectional, ForwardMetrics, NoOpMetrics};
pub use prefixed::PrefixedStream;
