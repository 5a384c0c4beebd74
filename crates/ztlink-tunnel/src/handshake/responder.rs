//! Accepting side of the hop handshake (relays and servers).

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};
use ztlink_chain::ChainDescriptor;
use ztlink_core::defaults::{READINESS_TOKEN, UPGRADE_PATH, UPGRADE_REQUEST_PREFIX};
use ztlink_core::io::PrefixedStream;
use ztlink_identity::VerifyError;

use crate::context::HopContext;
use crate::error::TunnelError;
use crate::telemetry::{EventOrigin, EventTag};
use crate::wire::{
    decode_cert, dump, encode_response, read_head, request_tokens_match, Head, ReadHead,
    CHAINS_HEADER, CLIENT_CERT_HEADER, TRACE_ID_HEADER,
};

/// A validated upgrade request.
#[derive(Debug, Clone)]
pub struct UpgradeRequest {
    pub trace_id: Option<String>,
    pub chain: ChainDescriptor,
    /// The initiator's certificate, already verified.
    pub client_cert_pem: String,
}

/// Read the upgrade request and run every check on it.
///
/// Servers (`origin` is [`EventOrigin::Server`]) also check the requested
/// target against their allowlist. Bytes received after the head stay in
/// the returned stream.
pub async fn read_upgrade_request<S>(
    mut io: S,
    ctx: &HopContext,
    origin: EventOrigin<'_>,
) -> Result<(UpgradeRequest, PrefixedStream<S>), TunnelError>
where
    S: AsyncRead + Unpin,
{
    let (raw, rest) = match read_head(&mut io, ctx.options.max_header_bytes, Some(UPGRADE_REQUEST_PREFIX)).await? {
        ReadHead::Complete { head, rest } => (head, rest),
        ReadHead::Mismatch(raw) | ReadHead::Incomplete(raw) => {
            return Err(TunnelError::IllegalRequest { dump: dump(&raw) });
        }
    };
    let head = Head::parse(&raw)
        .filter(is_upgrade_request_line)
        .ok_or_else(|| TunnelError::IllegalRequest { dump: dump(&raw) })?;

    if !request_tokens_match(&head) {
        return Err(TunnelError::ProtocolMismatch(format!(
            "upgrade={:?} connection={:?}",
            head.header("Upgrade").unwrap_or_default(),
            head.header("Connection").unwrap_or_default()
        )));
    }

    let chain = ChainDescriptor::parse(head.non_empty(CHAINS_HEADER).ok_or(TunnelError::ChainMissing)?)?;

    if let EventOrigin::Server(server) = origin {
        if !server.resources.allows(&chain.target) {
            warn!(target_addr = %chain.target.addr(), allowed = server.resources.len(), "target not in allowlist");
            ctx.emit(origin.event(
                Some(&chain),
                EventTag::ResourceNotFound,
                format!("{} is not an allowed resource", chain.target.addr()),
            ));
            return Err(TunnelError::ResourceNotFound {
                host: chain.target.host.clone(),
                port: chain.target.port,
            });
        }
    }

    let encoded = head
        .non_empty(CLIENT_CERT_HEADER)
        .ok_or(TunnelError::PeerCertMissing(CLIENT_CERT_HEADER))?;
    let verified = decode_cert(encoded)
        .map_err(VerifyError::CertParse)
        .and_then(|pem| ctx.verifier.verify(&pem, None).map(|()| pem));
    let client_cert_pem = match verified {
        Ok(pem) => pem,
        Err(e) => {
            warn!(error = %e, "initiator certificate rejected");
            ctx.emit(origin.event(Some(&chain), EventTag::ClientTlsFail, e.to_string()));
            return Err(TunnelError::PeerCertInvalid(e));
        }
    };

    let request = UpgradeRequest {
        trace_id: head.non_empty(TRACE_ID_HEADER).map(str::to_owned),
        chain,
        client_cert_pem,
    };
    debug!(trace_id = ?request.trace_id, chain = %request.chain.uuid, "upgrade request accepted");
    Ok((request, PrefixedStream::new(rest, io)))
}

fn is_upgrade_request_line(head: &Head) -> bool {
    let mut parts = head.start_line.split_whitespace();
    parts.next() == Some("GET")
        && parts.next() == Some(UPGRADE_PATH)
        && parts.next().is_some_and(|v| v.starts_with("HTTP/1."))
        && parts.next().is_none()
}

/// Answer with `101 Switching Protocols` and our own certificate.
pub async fn write_upgrade_response<W>(io: &mut W, ctx: &HopContext) -> Result<(), TunnelError>
where
    W: AsyncWrite + Unpin,
{
    io.write_all(&encode_response(&ctx.trust.cert_pem)).await?;
    io.flush().await?;
    Ok(())
}

/// Consume the readiness token, waiting at most `timeout` when given.
pub async fn await_readiness<R>(io: &mut R, timeout: Option<Duration>) -> Result<(), TunnelError>
where
    R: AsyncRead + Unpin,
{
    let mut token = [0u8; READINESS_TOKEN.len()];
    let read = io.read_exact(&mut token);
    match timeout {
        Some(limit) => {
            tokio::time::timeout(limit, read)
                .await
                .map_err(|_| TunnelError::ReadinessTimeout)??;
        }
        None => {
            read.await?;
        }
    }
    if token[..] != *READINESS_TOKEN {
        return Err(TunnelError::ReadinessMismatch);
    }
    Ok(())
}

/// Full responder exchange: request, response, readiness.
pub async fn respond<S>(
    io: S,
    ctx: &HopContext,
    origin: EventOrigin<'_>,
) -> Result<(UpgradeRequest, PrefixedStream<S>), TunnelError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (request, mut io) = read_upgrade_request(io, ctx, origin).await?;
    write_upgrade_response(&mut io, ctx).await?;
    await_readiness(&mut io, ctx.options.readiness_timeout).await?;
    Ok((request, io))
}
