//! What this process runs as, decided once from its own certificate.

use ztlink_chain::{ChainDescriptor, RelayConfig, ServerConfig};
use ztlink_identity::{Identity, Role};

use crate::error::TunnelError;
use crate::telemetry::EventOrigin;

/// Role-specific configuration of the local node.
#[derive(Debug, Clone)]
pub enum NodeConfig {
    /// A client's attributes are its own chain descriptor.
    Client(ChainDescriptor),
    Relay(RelayConfig),
    Server(ServerConfig),
}

impl NodeConfig {
    pub fn from_identity(identity: &Identity) -> Result<Self, TunnelError> {
        Ok(match identity.role {
            Role::Client => NodeConfig::Client(ChainDescriptor::from_attrs(&identity.attrs)?),
            Role::Relay => NodeConfig::Relay(RelayConfig::from_attrs(&identity.attrs)?),
            Role::Server => NodeConfig::Server(ServerConfig::from_attrs(&identity.attrs)?),
        })
    }

    pub fn role(&self) -> Role {
        match self {
            NodeConfig::Client(_) => Role::Client,
            NodeConfig::Relay(_) => Role::Relay,
            NodeConfig::Server(_) => Role::Server,
        }
    }

    /// Port to listen on.
    pub fn port(&self) -> u16 {
        match self {
            NodeConfig::Client(chain) => chain.port,
            NodeConfig::Relay(relay) => relay.port,
            NodeConfig::Server(server) => server.port,
        }
    }

    pub fn origin(&self) -> EventOrigin<'_> {
        match self {
            NodeConfig::Client(_) => EventOrigin::Client,
            NodeConfig::Relay(relay) => EventOrigin::Relay(relay),
            NodeConfig::Server(server) => EventOrigin::Server(server),
        }
    }
}
