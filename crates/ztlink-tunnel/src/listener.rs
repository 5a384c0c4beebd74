//! Accept loop shared by all roles.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use ztlink_metrics::{record_connection_accepted, record_connection_closed, record_error};
use ztlink_transport::create_listener;

use crate::context::HopContext;
use crate::error::TunnelError;
use crate::handler;
use crate::node::NodeConfig;
use crate::telemetry::EventOrigin;
use crate::tracker::ConnectionTracker;

/// Pause after a failed `accept` (e.g. out of file descriptors).
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// A running listener.
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting. In-flight connections get the configured grace period,
    /// after which their forwarding is cancelled.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Token that stops the listener when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Wait for the accept loop to exit and connections to drain.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            error!(error = %e, "listener task failed");
        }
    }
}

/// Bind `listen_host:port` for `node` and start accepting.
///
/// Clients accept plain TCP from local applications; relays and servers
/// terminate TLS and need a private key.
pub async fn listen(node: NodeConfig, ctx: Arc<HopContext>) -> Result<ListenerHandle, TunnelError> {
    if !matches!(node, NodeConfig::Client(_)) && ctx.acceptor.is_none() {
        return Err(TunnelError::Config(format!(
            "{} role needs a private key to terminate TLS",
            node.role()
        )));
    }

    let addr = SocketAddr::new(ctx.options.listen_host, node.port());
    let listener = create_listener(addr, ctx.options.connection_backlog)?;
    let local_addr = listener.local_addr()?;
    info!(role = %node.role(), address = %local_addr, backlog = ctx.options.connection_backlog, "listening");

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(accept_loop(listener, Arc::new(node), ctx, shutdown.clone()));
    Ok(ListenerHandle {
        local_addr,
        shutdown,
        task,
    })
}

async fn accept_loop(
    listener: TcpListener,
    node: Arc<NodeConfig>,
    ctx: Arc<HopContext>,
    shutdown: CancellationToken,
) {
    let tracker = ConnectionTracker::new();
    // Cancelled once the grace period after shutdown has run out.
    let connections = CancellationToken::new();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("shutdown requested, stopping accept loop");
                break;
            }

            result = listener.accept() => {
                let (tcp, peer) = match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                };
                if let Err(e) = tcp.set_nodelay(true) {
                    debug!(peer = %peer, error = %e, "set_nodelay failed");
                }
                debug!(peer = %peer, "new connection");

                let node = node.clone();
                let ctx = ctx.clone();
                let guard = tracker.guard();
                let cancel = connections.child_token();
                let span = info_span!(
                    "conn",
                    role = %node.role(),
                    peer = %peer,
                    trace_id = tracing::field::Empty
                );

                tokio::spawn(
                    async move {
                        let _guard = guard;
                        record_connection_accepted();
                        let start = Instant::now();

                        let outcome = AssertUnwindSafe(serve(tcp, &node, &ctx, &cancel)).catch_unwind().await;

                        let duration_secs = start.elapsed().as_secs_f64();
                        record_connection_closed(duration_secs);
                        match outcome {
                            Ok(Ok(())) => debug!(duration_secs, "connection closed"),
                            Ok(Err(err)) => {
                                record_error(err.error_type());
                                warn!(duration_secs, error = %err, "connection closed with error");
                            }
                            Err(_) => error!(duration_secs, "connection handler panicked"),
                        }
                    }
                    .instrument(span),
                );
            }
        }
    }
    drop(listener);

    let active = tracker.count();
    if active > 0 {
        info!(active, "waiting for connections to drain");
        if tracker.wait_for_zero(ctx.options.shutdown_timeout).await {
            info!("all connections drained");
        } else {
            warn!(remaining = tracker.count(), "shutdown timeout, cancelling active connections");
        }
    }
    connections.cancel();
    info!("listener stopped");
}

async fn serve(
    tcp: TcpStream,
    node: &NodeConfig,
    ctx: &HopContext,
    cancel: &CancellationToken,
) -> Result<(), TunnelError> {
    match node {
        NodeConfig::Client(chain) => handler::client::handle(tcp, chain, ctx, cancel).await,
        NodeConfig::Relay(relay) => {
            let tls = accept_tls(tcp, ctx, node.origin()).await?;
            handler::relay::handle(tls, relay, ctx, cancel).await
        }
        NodeConfig::Server(server) => {
            let tls = accept_tls(tcp, ctx, node.origin()).await?;
            handler::server::handle(tls, server, ctx, cancel).await
        }
    }
}

/// TLS accept for relays and servers. A failure here is a failed hop like
/// any handshake failure and is reported the same way.
async fn accept_tls(
    tcp: TcpStream,
    ctx: &HopContext,
    origin: EventOrigin<'_>,
) -> Result<tokio_rustls::server::TlsStream<TcpStream>, TunnelError> {
    let started = Instant::now();
    let acceptor = ctx
        .acceptor
        .as_ref()
        .ok_or_else(|| TunnelError::Config("no TLS acceptor configured".into()))?;
    match acceptor.accept(tcp).await {
        Ok(tls) => Ok(tls),
        Err(e) => {
            let err = TunnelError::TlsAccept(e);
            handler::report_failure(ctx, origin, None, &err, started);
            Err(err)
        }
    }
}
