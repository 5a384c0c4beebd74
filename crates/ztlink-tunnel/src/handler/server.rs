//! Server role: end of the chain, where the tunnel meets the target.

use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Span};
use ztlink_chain::ServerConfig;
use ztlink_core::io::forward_bidirectional;
use ztlink_transport::{connect_tcp, MuxSession};

use super::{report_failure, report_success};
use crate::context::HopContext;
use crate::error::TunnelError;
use crate::handshake::respond;
use crate::telemetry::{EventOrigin, ForwardedBytes};
use crate::trace::next_trace_id;

pub(crate) async fn handle<S>(
    inbound: S,
    server: &ServerConfig,
    ctx: &HopContext,
    cancel: &CancellationToken,
) -> Result<(), TunnelError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let started = Instant::now();
    let origin = EventOrigin::Server(server);

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
    let target_addr = chain.target.addr();
    let target = match connect_tcp(&target_addr, ctx.options.connect_timeout).await {
        Ok(stream) => stream,
        Err(source) => {
            let e = TunnelError::DialFailure {
                addr: target_addr,
                source,
            };
            report_failure(ctx, origin, Some(chain), &e, started);
            return Err(e);
        }
    };
    debug!(target_addr = %target_addr, "target connected");
    report_success(ctx, origin, chain, started, format!("{} connected to {target_addr}", chain.uuid));

    let session = MuxSession::server(inbound);
    let result = match session.accept_stream().await {
        Ok(stream) => forward_bidirectional(
            stream,
            target,
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
