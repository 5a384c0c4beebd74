//! Transport layer for ztlink hops.
//!
//! # Modules
//!
//! - [`tls`]: TLS acceptor (own certificate) and connector pinned to the
//!   overlay trust root.
//! - [`tcp`]: listener creation and bounded TCP dialing.
//! - [`mux`]: stream multiplexing over one established tunnel.

pub mod error;
pub mod mux;
pub mod tcp;
pub mod tls;

pub use error::TransportError;
pub use mux::{MuxSession, MuxStream};
pub use tcp::{connect_tcp, create_listener};
pub use tls::{TlsTransportAcceptor, TlsTransportConnector};
