//! # ztlink
//!
//! A zero-trust overlay that carries TCP connections from a client, through
//! a chain of relays, to a server that reaches the requested target. Every
//! hop is TLS and every peer proves an identity certificate issued by the
//! overlay's own root.
//!
//! ## Crates
//!
//! - [`ztlink_core`] - Defaults, error labels, forwarding primitives
//! - [`ztlink_identity`] - Certificate verification and role extraction
//! - [`ztlink_chain`] - Chain descriptor and next-hop routing
//! - [`ztlink_transport`] - TLS endpoints and stream multiplexing
//! - [`ztlink_config`] - Configuration loading and validation
//! - [`ztlink_metrics`] - Prometheus metrics
//! - [`ztlink_tunnel`] - Handshake, role handlers and listener

pub use ztlink_chain as chain;
pub use ztlink_config as config;
pub use ztlink_core as core;
pub use ztlink_identity as identity;
pub use ztlink_metrics as metrics;
pub use ztlink_transport as transport;
pub use ztlink_tunnel as tunnel;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use ztlink_chain::{ChainDescriptor, NextHop};
    pub use ztlink_config::{load_config, validate_config, Config};
    pub use ztlink_identity::{extract_role, verify_peer_certificate, Role, TrustMaterial};
    pub use ztlink_tunnel::{listen, HopContext, ListenerHandle, NodeConfig, TunnelError, TunnelOptions};
}
