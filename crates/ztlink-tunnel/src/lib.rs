//! Zero-trust tunnel hops.
//!
//! A client accepts local TCP connections and carries each one through a
//! chain of relays to a server, which connects to the requested target.
//! Every hop runs over TLS and proves its identity inline during an HTTP
//! upgrade handshake; see [`handshake`].

pub mod cli;
pub mod context;
pub mod error;
pub mod handshake;
pub mod listener;
pub mod node;
pub mod telemetry;
pub mod trace;
pub mod tracker;
pub mod wire;

mod handler;

pub use context::{HopContext, TunnelOptions};
pub use error::TunnelError;
pub use listener::{listen, ListenerHandle};
pub use node::NodeConfig;
pub use telemetry::{
    Event, EventOrigin, EventSink, EventTag, LogEventSink, MemoryEventSink, MemoryMetrics, MetricsSink, Outcome,
    PrometheusMetrics,
};
