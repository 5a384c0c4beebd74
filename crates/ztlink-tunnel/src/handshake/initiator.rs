//! Dialing side of the hop handshake (clients and relays).

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};
use ztlink_chain::{ChainDescriptor, NextHop};
use ztlink_core::defaults::READINESS_TOKEN;
use ztlink_core::io::PrefixedStream;
use ztlink_identity::VerifyError;

use crate::context::HopContext;
use crate::error::TunnelError;
use crate::telemetry::{EventOrigin, EventTag};
use crate::wire::{decode_cert, dump, encode_request, read_head, response_accepted, Head, ReadHead, SERVER_CERT_HEADER};

/// Run the handshake over an established connection to `hop`.
///
/// The responder must prove it holds a certificate from our trust root
/// that is valid for `hop.host`. On success the readiness token has been
/// sent and the stream is ready for tunnel traffic.
pub async fn initiate<S>(
    mut io: S,
    ctx: &HopContext,
    origin: EventOrigin<'_>,
    hop: &NextHop,
    trace_id: &str,
    chain: &ChainDescriptor,
) -> Result<PrefixedStream<S>, TunnelError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = encode_request(&hop.addr(), trace_id, &chain.to_json()?, &ctx.trust.cert_pem);
    io.write_all(&request).await?;
    io.flush().await?;

    let (raw, rest) = match read_head(&mut io, ctx.options.max_header_bytes, None).await? {
        ReadHead::Complete { head, rest } => (head, rest),
        ReadHead::Mismatch(raw) | ReadHead::Incomplete(raw) => {
            return Err(TunnelError::HandshakeRejected { response: dump(&raw) });
        }
    };
    let head = Head::parse(&raw)
        .filter(response_accepted)
        .ok_or_else(|| TunnelError::HandshakeRejected { response: dump(&raw) })?;

    let encoded = head
        .non_empty(SERVER_CERT_HEADER)
        .ok_or(TunnelError::PeerCertMissing(SERVER_CERT_HEADER))?;
    let verified = decode_cert(encoded)
        .map_err(VerifyError::CertParse)
        .and_then(|pem| ctx.verifier.verify(&pem, Some(&hop.host)));
    if let Err(e) = verified {
        warn!(next_hop = %hop, error = %e, "next hop certificate rejected");
        ctx.emit(origin.event(Some(chain), EventTag::ServerTlsFail, format!("{hop}: {e}")));
        return Err(TunnelError::PeerCertInvalid(e));
    }

    io.write_all(READINESS_TOKEN).await?;
    io.flush().await?;
    debug!(next_hop = %hop, trace_id, "handshake complete");
    Ok(PrefixedStream::new(rest, io))
}
