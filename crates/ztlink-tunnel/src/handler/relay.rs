//! Relay role: answer the previous hop, dial the next one, splice.
//!
//! Relays never look inside the tunnel; the multiplexed stream passes
//! through as raw bytes.

use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Span};
use ztlink_chain::{next_hop_for_relay, ChainDescriptor, NextHop, RelayConfig};
use ztlink_core::io::forward_bidirectional;

use super::{open_tunnel, report_failure, report_success};
use crate::context::HopContext;
use crate::error::TunnelError;
use crate::handshake::respond;
use crate::telemetry::{EventOrigin, ForwardedBytes};
use crate::trace::next_trace_id;

pub(crate) async fn handle<S>(
    inbound: S,
    relay: &RelayConfig,
    ctx: &HopContext,
    cancel: &CancellationToken,
) -> Result<(), TunnelError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let started = Instant::now();
    let origin = EventOrigin::Relay(relay);

    let (request, inbound) = match respond(inbound, ctx, origin).await {
        Ok(accepted) => accepted,
        Err(e) => {
            report_failure(ctx, origin, None, &e, started);
            return Err(e);
        }
    };
    let trace_id = request.trace_id.clone().unwrap_or_else(next_trace_id);
    Span::current().record("trace_id", trace_id.as_str());

    let chain = &request.chain;
    let hop = next_hop(chain, relay);
    let outbound = match open_tunnel(ctx, origin, &hop, &trace_id, chain).await {
        Ok(tunnel) => tunnel,
        Err(e) => {
            report_failure(ctx, origin, Some(chain), &e, started);
            return Err(e);
        }
    };
    report_success(ctx, origin, chain, started, format!("relaying {} to {hop}", chain.uuid));

    forward_bidirectional(
        inbound,
        outbound,
        ctx.options.relay_buffer_size,
        &ForwardedBytes,
        cancel,
    )
    .await?;
    Ok(())
}

fn next_hop(chain: &ChainDescriptor, relay: &RelayConfig) -> NextHop {
    let hop = next_hop_for_relay(chain, &relay.uuid);
    if !chain.relays.iter().any(|r| r.uuid == relay.uuid) {
        warn!(relay = %relay.uuid, chain = %chain.uuid, next_hop = %hop, "relay not listed in chain, routing to server");
    } else {
        debug!(next_hop = %hop, "next hop resolved");
    }
    hop
}
