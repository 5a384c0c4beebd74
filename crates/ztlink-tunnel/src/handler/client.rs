//! Client role: every local TCP connection gets its own tunnel.

use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Span};
use ztlink_chain::{next_hop_for_client, ChainDescriptor};
use ztlink_core::io::forward_bidirectional;
use ztlink_transport::MuxSession;

use super::{open_tunnel, report_failure, report_success};
use crate::context::HopContext;
use crate::error::TunnelError;
use crate::telemetry::{EventOrigin, ForwardedBytes};
use crate::trace::next_trace_id;

pub(crate) async fn handle<S>(
    local: S,
    chain: &ChainDescriptor,
    ctx: &HopContext,
    cancel: &CancellationToken,
) -> Result<(), TunnelError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let started = Instant::now();
    let origin = EventOrigin::Client;
    let trace_id = next_trace_id();
    Span::current().record("trace_id", trace_id.as_str());

    let hop = next_hop_for_client(chain);
    debug!(next_hop = %hop, relays = chain.relays.len(), "opening tunnel");
    let tunnel = match open_tunnel(ctx, origin, &hop, &trace_id, chain).await {
        Ok(tunnel) => tunnel,
        Err(e) => {
            report_failure(ctx, origin, Some(chain), &e, started);
            return Err(e);
        }
    };
    report_success(ctx, origin, chain, started, format!("tunnel via {hop} to {}", chain.target.addr()));

    let session = MuxSession::client(tunnel);
    let result = match session.open_stream().await {
        Ok(stream) => forward_bidirectional(
            local,
            stream,
            ctx.options.relay_buffer_size,
            &ForwardedBytes,
            cancel,
        )
        .await
        .map_err(TunnelError::from),
        Err(e) => Err(e.into()),
    };
    session.close().await;
    result
}
