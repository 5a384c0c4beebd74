//! Chain model for the overlay.
//!
//! A client's certificate attributes describe its whole path:
//! client → relays (ordered by `sort`) → server → target. That description
//! travels with every hop as JSON and each hop routes from it.
//!
//! - [`descriptor`]: the chain descriptor and its JSON form.
//! - [`node`]: static relay/server configuration from certificate attributes.
//! - [`router`]: next-hop selection for clients and relays.

pub mod descriptor;
pub mod error;
pub mod node;
pub mod router;

pub use descriptor::{ChainDescriptor, RelayHop, Resource, Resources, ServerEndpoint, Target};
pub use error::ChainError;
pub use node::{RelayConfig, ServerConfig};
pub use router::{next_hop_for_client, next_hop_for_relay, relay_position, NextHop};

use serde::{Deserialize, Deserializer};

/// Deserialize `null` as the type's default (lists published as `null`).
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
