//! TLS transport.
//!
//! - `TlsTransportAcceptor`: TLS server presenting the node's own certificate.
//! - `TlsTransportConnector`: TLS client that only trusts the overlay root and
//!   checks the next hop's certificate against the host it dialed.

use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::RootCertStore;
use tokio::net::TcpStream;
use tokio_rustls::{client, server, TlsAcceptor, TlsConnector};
use ztlink_identity::pem::{parse_certs, parse_private_key};

use crate::error::TransportError;
use crate::tcp::connect_tcp;

// ── TLS Acceptor ──

#[derive(Clone)]
pub struct TlsTransportAcceptor {
    acceptor: TlsAcceptor,
}

impl TlsTransportAcceptor {
    /// Build from the node's certificate chain and private key (both PEM).
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self, TransportError> {
        let certs = parse_certs(cert_pem).map_err(TransportError::Config)?;
        let key = parse_private_key(key_pem).map_err(TransportError::Config)?;

        let config = rustls::ServerConfig::builder_with_provider(ztlink_identity::crypto_provider())
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;

        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(config)),
        })
    }

    pub async fn accept(&self, tcp: TcpStream) -> Result<server::TlsStream<TcpStream>, TransportError> {
        self.acceptor.accept(tcp).await.map_err(handshake_error)
    }
}

/// tokio-rustls reports handshake failures as I/O errors; unwrap the TLS
/// alert or certificate error underneath so callers can match on it.
fn handshake_error(err: std::io::Error) -> TransportError {
    match err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    {
        Some(tls) => TransportError::Tls(tls.clone()),
        None => TransportError::Io(err),
    }
}

// ── TLS Connector ──

#[derive(Clone)]
pub struct TlsTransportConnector {
    connector: TlsConnector,
}

impl TlsTransportConnector {
    /// Build a connector that trusts only `roots`.
    pub fn new(roots: Arc<RootCertStore>) -> Result<Self, TransportError> {
        let config = rustls::ClientConfig::builder_with_provider(ztlink_identity::crypto_provider())
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
        })
    }

    /// Dial `host:port` over TCP, then run the TLS handshake with `host` as
    /// the server name. The TCP dial is bounded by `timeout`.
    pub async fn connect(
        &self,
        host: &str,
        addr: &str,
        timeout: Duration,
    ) -> Result<client::TlsStream<TcpStream>, TransportError> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| TransportError::Config(format!("invalid server name {host:?}: {e}")))?;
        let tcp = connect_tcp(addr, timeout).await?;
        self.connector
            .connect(server_name, tcp)
            .await
            .map_err(handshake_error)
    }
}
