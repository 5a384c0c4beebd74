//! Next-hop selection.
//!
//! Clients dial the first relay, or the server if the chain has none.
//! A relay finds itself in the chain by uuid and dials its successor; the
//! last relay dials the server.

use std::fmt;

use crate::descriptor::ChainDescriptor;

/// Address of the hop to dial next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextHop {
    /// Host as written in the chain; also the name the hop must prove.
    pub host: String,
    pub port: u16,
}

impl NextHop {
    fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }

    /// `host:port` for dialing.
    pub fn addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr())
    }
}

pub(crate) fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

pub fn next_hop_for_client(chain: &ChainDescriptor) -> NextHop {
    match chain.relays.first() {
        Some(first) => NextHop::new(&first.host, first.out_port),
        None => NextHop::new(&chain.server.host, chain.server.out_port),
    }
}

/// Index of the relay that follows `self_uuid`, if any.
///
/// Scans every relay except the last; a later match overrides an earlier one.
/// `None` means the relay is last, absent, or the chain has fewer than two
/// relays, and the server comes next.
pub fn relay_position(chain: &ChainDescriptor, self_uuid: &str) -> Option<usize> {
    let scanned = chain.relays.len().saturating_sub(1);
    chain.relays[..scanned]
        .iter()
        .rposition(|relay| relay.uuid == self_uuid)
        .map(|idx| idx + 1)
}

pub fn next_hop_for_relay(chain: &ChainDescriptor, self_uuid: &str) -> NextHop {
    match relay_position(chain, self_uuid) {
        Some(next) => {
            let relay = &chain.relays[next];
            NextHop::new(&relay.host, relay.out_port)
        }
        None => NextHop::new(&chain.server.host, chain.server.out_port),
    }
}
