//! HTTP/1.1 upgrade framing used by the hop handshake.
//!
//! Only the head is HTTP; once the response is written the connection
//! carries the readiness token and then opaque bytes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use ztlink_core::defaults::UPGRADE_PATH;

pub const TRACE_ID_HEADER: &str = "X-TraceID";
pub const CHAINS_HEADER: &str = "X-Chains";
pub const CLIENT_CERT_HEADER: &str = "X-ClientCert";
pub const SERVER_CERT_HEADER: &str = "X-ServerCert";

pub const SWITCHING_PROTOCOLS: &str = "HTTP/1.1 101 Switching Protocols";

const HEAD_END: &[u8] = b"\r\n\r\n";
const READ_CHUNK: usize = 2048;
/// Longest dump kept in diagnostics.
const MAX_DUMP: usize = 2048;

/// A parsed request or response head.
#[derive(Debug, Clone)]
pub struct Head {
    pub start_line: String,
    headers: Vec<(String, String)>,
}

impl Head {
    /// Parse a head ending in an empty line. `None` if it is not UTF-8 or
    /// has no start line.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(raw).ok()?;
        let mut lines = text.split("\r\n");
        let start_line = lines.next().filter(|l| !l.is_empty())?.to_string();
        let headers = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();
        Some(Self {
            start_line,
            headers,
        })
    }

    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Like [`Head::header`], but treats an empty value as absent.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.header(name).filter(|v| !v.is_empty())
    }
}

/// Outcome of reading a head off the wire.
#[derive(Debug)]
pub enum ReadHead {
    /// Full head plus whatever the peer sent after it.
    Complete { head: Bytes, rest: Bytes },
    /// The first bytes do not match the expected prefix.
    Mismatch(Bytes),
    /// EOF or size limit reached before the end of the head.
    Incomplete(Bytes),
}

/// Read until the blank line that ends an HTTP head.
///
/// With `prefix`, stop as soon as the received bytes diverge from it, so a
/// non-upgrade peer is rejected without waiting for a full head.
pub async fn read_head<R>(reader: &mut R, max_bytes: usize, prefix: Option<&[u8]>) -> std::io::Result<ReadHead>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    loop {
        if let Some(prefix) = prefix {
            let n = buf.len().min(prefix.len());
            if buf[..n] != prefix[..n] {
                return Ok(ReadHead::Mismatch(buf.freeze()));
            }
        }
        if let Some(end) = find_head_end(&buf) {
            let head = buf.split_to(end).freeze();
            return Ok(ReadHead::Complete {
                head,
                rest: buf.freeze(),
            });
        }
        if buf.len() >= max_bytes {
            return Ok(ReadHead::Incomplete(buf.freeze()));
        }
        buf.reserve(READ_CHUNK);
        if reader.read_buf(&mut buf).await? == 0 {
            return Ok(ReadHead::Incomplete(buf.freeze()));
        }
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_END.len())
        .position(|w| w == HEAD_END)
        .map(|idx| idx + HEAD_END.len())
}

/// Printable form of raw bytes for error messages.
pub fn dump(raw: &[u8]) -> String {
    let raw = &raw[..raw.len().min(MAX_DUMP)];
    String::from_utf8_lossy(raw).into_owned()
}

pub fn encode_request(host: &str, trace_id: &str, chains: &str, client_cert_pem: &str) -> Vec<u8> {
    format!(
        "GET {UPGRADE_PATH} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         {TRACE_ID_HEADER}: {trace_id}\r\n\
         {CHAINS_HEADER}: {chains}\r\n\
         {CLIENT_CERT_HEADER}: {}\r\n\
         \r\n",
        encode_cert(client_cert_pem)
    )
    .into_bytes()
}

pub fn encode_response(server_cert_pem: &str) -> Vec<u8> {
    format!(
        "{SWITCHING_PROTOCOLS}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         {SERVER_CERT_HEADER}: {}\r\n\
         \r\n",
        encode_cert(server_cert_pem)
    )
    .into_bytes()
}

/// Upgrade tokens a responder accepts.
pub fn request_tokens_match(head: &Head) -> bool {
    let upgrade = head.header("Upgrade").unwrap_or_default();
    let connection = head.header("Connection").unwrap_or_default().to_ascii_lowercase();
    upgrade.eq_ignore_ascii_case("websocket") && matches!(connection.as_str(), "upgrade" | "keep-alive, upgrade")
}

/// Status and tokens an initiator accepts.
pub fn response_accepted(head: &Head) -> bool {
    head.start_line == SWITCHING_PROTOCOLS
        && head
            .header("Upgrade")
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
        && head
            .header("Connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("upgrade"))
}

/// Certificates travel as base64 of the PEM text.
pub fn encode_cert(pem: &str) -> String {
    STANDARD.encode(pem)
}

pub fn decode_cert(value: &str) -> Result<String, String> {
    let raw = STANDARD
        .decode(value.trim())
        .map_err(|e| format!("invalid base64: {e}"))?;
    String::from_utf8(raw).map_err(|_| "certificate is not UTF-8 PEM".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ztlink_core::defaults::UPGRADE_REQUEST_PREFIX;

    #[test]
    fn request_carries_all_headers() {
        let raw = encode_request("relay.example:9443", "trace-1", r#"{"uuid":"c"}"#, "PEM");
        let end = find_head_end(&raw).unwrap();
        assert_eq!(end, raw.len());

        let head = Head::parse(&raw).unwrap();
        assert_eq!(head.start_line, "GET /secretLink HTTP/1.1");
        assert_eq!(head.header("host"), Some("relay.example:9443"));
        assert_eq!(head.header("x-traceid"), Some("trace-1"));
        assert_eq!(head.header(CHAINS_HEADER), Some(r#"{"uuid":"c"}"#));
        assert_eq!(decode_cert(head.header(CLIENT_CERT_HEADER).unwrap()).unwrap(), "PEM");
        assert!(request_tokens_match(&head));
    }

    #[test]
    fn keep_alive_upgrade_is_accepted() {
        let head = Head::parse(
            b"GET /secretLink HTTP/1.1\r\nConnection: keep-alive, Upgrade\r\nUpgrade: WebSocket\r\n\r\n",
        )
        .unwrap();
        assert!(request_tokens_match(&head));

        let head =
            Head::parse(b"GET /secretLink HTTP/1.1\r\nConnection: close\r\nUpgrade: websocket\r\n\r\n")
                .unwrap();
        assert!(!request_tokens_match(&head));
    }

    #[test]
    fn response_must_switch_protocols() {
        let ok = Head::parse(&encode_response("PEM")).unwrap();
        assert!(response_accepted(&ok));
        assert_eq!(decode_cert(ok.header(SERVER_CERT_HEADER).unwrap()).unwrap(), "PEM");

        let rejected = Head::parse(b"HTTP/1.1 403 Forbidden\r\nConnection: Upgrade\r\n\r\n").unwrap();
        assert!(!response_accepted(&rejected));
    }

    #[test]
    fn bad_certificate_encoding() {
        assert!(decode_cert("%%%").is_err());
    }

    #[tokio::test]
    async fn head_and_trailing_bytes_are_split() {
        let mut wire = encode_request("h:1", "t", "{}", "PEM");
        wire.extend_from_slice(b"serverCaReady");
        let mut reader = &wire[..];

        match read_head(&mut reader, 65536, Some(UPGRADE_REQUEST_PREFIX)).await.unwrap() {
            ReadHead::Complete { head, rest } => {
                assert!(head.ends_with(HEAD_END));
                assert_eq!(&rest[..], b"serverCaReady");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn foreign_protocol_is_caught_early() {
        let mut reader = &b"SSH-2.0-OpenSSH_9.6\r\n"[..];
        let outcome = read_head(&mut reader, 65536, Some(UPGRADE_REQUEST_PREFIX)).await.unwrap();
        assert!(matches!(outcome, ReadHead::Mismatch(raw) if raw.starts_with(b"SSH")));
    }

    #[tokio::test]
    async fn oversized_head_is_incomplete() {
        let mut wire = b"GET /secretLink HTTP/1.1\r\nX-Pad: ".to_vec();
        wire.extend(std::iter::repeat(b'a').take(10_000));
        let mut reader = &wire[..];
        let outcome = read_head(&mut reader, 4096, None).await.unwrap();
        assert!(matches!(outcome, ReadHead::Incomplete(_)));
    }
}
