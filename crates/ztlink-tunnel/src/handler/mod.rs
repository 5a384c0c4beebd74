//! One handler per role, each driving a single connection to completion.

pub(crate) mod client;
pub(crate) mod relay;
pub(crate) mod server;

use std::time::Instant;

use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls;
use tracing::warn;
use ztlink_chain::{ChainDescriptor, NextHop};
use ztlink_core::io::PrefixedStream;
use ztlink_identity::VerifyError;
use ztlink_transport::TransportError;

use crate::context::HopContext;
use crate::error::TunnelError;
use crate::handshake::initiate;
use crate::telemetry::{EventOrigin, EventTag, Outcome};

/// Outbound leg after a completed handshake.
pub(crate) type Tunnel = PrefixedStream<TlsStream<TcpStream>>;

/// Dial `hop` over TLS and run the initiator handshake on it.
///
/// A next hop whose TLS certificate does not verify is treated like one whose
/// inline certificate does not: a server TLS failure event and
/// `PeerCertInvalid`.
pub(crate) async fn open_tunnel(
    ctx: &HopContext,
    origin: EventOrigin<'_>,
    hop: &NextHop,
    trace_id: &str,
    chain: &ChainDescriptor,
) -> Result<Tunnel, TunnelError> {
    let tls = match ctx
        .connector
        .connect(&hop.host, &hop.addr(), ctx.options.connect_timeout)
        .await
    {
        Ok(tls) => tls,
        Err(TransportError::Tls(err @ rustls::Error::InvalidCertificate(_))) => {
            let err = VerifyError::from(err);
            warn!(next_hop = %hop, error = %err, "next hop TLS certificate rejected");
            ctx.emit(origin.event(Some(chain), EventTag::ServerTlsFail, format!("{hop}: {err}")));
            return Err(TunnelError::PeerCertInvalid(err));
        }
        Err(source) => {
            return Err(TunnelError::DialFailure {
                addr: hop.addr(),
                source,
            })
        }
    };
    initiate(tls, ctx, origin, hop, trace_id, chain).await
}

/// Id and name a delay sample is labelled with.
fn sample_labels<'a>(origin: EventOrigin<'a>, chain: Option<&'a ChainDescriptor>) -> (&'a str, &'a str) {
    match origin {
        EventOrigin::Client => chain.map_or(("", ""), |c| (c.uuid.as_str(), c.name.as_str())),
        EventOrigin::Relay(relay) => (relay.uuid.as_str(), relay.name.as_str()),
        EventOrigin::Server(server) => (server.uuid.as_str(), server.name.as_str()),
    }
}

pub(crate) fn report_success(
    ctx: &HopContext,
    origin: EventOrigin<'_>,
    chain: &ChainDescriptor,
    started: Instant,
    msg: String,
) {
    let (id, name) = sample_labels(origin, Some(chain));
    ctx.metrics
        .record_delay(origin.role(), Outcome::Success, started.elapsed(), id, name);
    ctx.emit(origin.event(Some(chain), EventTag::ConnectSuccess, msg));
}

/// Record a failed hop. Failures that already produced their own event
/// (certificate, allowlist) only add the delay sample.
pub(crate) fn report_failure(
    ctx: &HopContext,
    origin: EventOrigin<'_>,
    chain: Option<&ChainDescriptor>,
    err: &TunnelError,
    started: Instant,
) {
    let (id, name) = sample_labels(origin, chain);
    ctx.metrics
        .record_delay(origin.role(), Outcome::Fail, started.elapsed(), id, name);
    if !matches!(
        err,
        TunnelError::PeerCertInvalid(_) | TunnelError::ResourceNotFound { .. }
    ) {
        ctx.emit(origin.event(chain, EventTag::ConnectFail, err.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ztlink_chain::{RelayConfig, ServerConfig};

    #[test]
    fn labels_follow_the_reporting_node() {
        let chain = ChainDescriptor {
            uuid: "c-1".into(),
            name: "laptop".into(),
            ..Default::default()
        };
        assert_eq!(sample_labels(EventOrigin::Client, Some(&chain)), ("c-1", "laptop"));
        assert_eq!(sample_labels(EventOrigin::Client, None), ("", ""));

        let relay = RelayConfig {
            uuid: "r-1".into(),
            name: "hop".into(),
            ..Default::default()
        };
        assert_eq!(sample_labels(EventOrigin::Relay(&relay), Some(&chain)), ("r-1", "hop"));

        let server = ServerConfig {
            uuid: "s-1".into(),
            name: "edge".into(),
            ..Default::default()
        };
        assert_eq!(sample_labels(EventOrigin::Server(&server), None), ("s-1", "edge"));
    }
}
