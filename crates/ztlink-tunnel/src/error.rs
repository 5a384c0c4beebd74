//! Error types for tunnel hops.

use thiserror::Error;
use ztlink_chain::ChainError;
use ztlink_core::errors::{
    ERROR_CERT, ERROR_CONFIG, ERROR_DIAL, ERROR_HANDSHAKE, ERROR_IO, ERROR_PEER_CERT,
    ERROR_PROTOCOL, ERROR_RESOURCE, ERROR_TIMEOUT, ERROR_TLS_HANDSHAKE,
};
use ztlink_identity::{IdentityError, VerifyError};
use ztlink_transport::TransportError;

/// Errors that end a tunnel connection or prevent a node from starting.
#[derive(Error, Debug)]
pub enum TunnelError {
    /// Own certificate unreadable.
    #[error("certificate parse error: {0}")]
    CertParse(String),

    /// Own certificate carries no usable role.
    #[error("certificate type error: {0}")]
    CertType(String),

    /// Chain descriptor or node configuration unreadable.
    #[error("parse error: {0}")]
    Parse(#[from] ChainError),

    /// The next hop did not answer with a valid upgrade response.
    #[error("upgrade rejected by next hop:\n{response}")]
    HandshakeRejected { response: String },

    /// Upgrade request carried the wrong Connection/Upgrade tokens.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    #[error("X-Chains header is missing")]
    ChainMissing,

    /// `X-ClientCert` (inbound) or `X-ServerCert` (outbound) absent.
    #[error("{0} header is missing")]
    PeerCertMissing(&'static str),

    #[error("peer certificate rejected: {0}")]
    PeerCertInvalid(#[source] VerifyError),

    #[error("target {host}:{port} is not an allowed resource")]
    ResourceNotFound { host: String, port: u16 },

    #[error("timed out waiting for readiness token")]
    ReadinessTimeout,

    #[error("readiness token mismatch")]
    ReadinessMismatch,

    /// Inbound bytes are not an upgrade request.
    #[error("illegal request:\n{dump}")]
    IllegalRequest { dump: String },

    #[error("dial {addr} failed: {source}")]
    DialFailure {
        addr: String,
        #[source]
        source: TransportError,
    },

    #[error("TLS accept failed: {0}")]
    TlsAccept(#[source] TransportError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TunnelError {
    /// Stable label for metrics and logs.
    pub fn error_type(&self) -> &'static str {
        match self {
            TunnelError::CertParse(_) | TunnelError::CertType(_) => ERROR_CERT,
            TunnelError::Parse(_) | TunnelError::ChainMissing => ERROR_PROTOCOL,
            TunnelError::HandshakeRejected { .. }
            | TunnelError::ProtocolMismatch(_)
            | TunnelError::IllegalRequest { .. }
            | TunnelError::ReadinessMismatch => ERROR_HANDSHAKE,
            TunnelError::PeerCertMissing(_) | TunnelError::PeerCertInvalid(_) => ERROR_PEER_CERT,
            TunnelError::ResourceNotFound { .. } => ERROR_RESOURCE,
            TunnelError::ReadinessTimeout => ERROR_TIMEOUT,
            TunnelError::DialFailure { .. } => ERROR_DIAL,
            TunnelError::TlsAccept(_) => ERROR_TLS_HANDSHAKE,
            TunnelError::Transport(_) | TunnelError::Config(_) => ERROR_CONFIG,
            TunnelError::Io(_) => ERROR_IO,
        }
    }
}

impl From<IdentityError> for TunnelError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::CertParse(msg) => TunnelError::CertParse(msg),
            IdentityError::CertType(msg) => TunnelError::CertType(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_errors_keep_their_kind() {
        let err: TunnelError = IdentityError::CertType("gateway".into()).into();
        assert!(matches!(err, TunnelError::CertType(_)));
        assert_eq!(err.error_type(), ERROR_CERT);
    }

    #[test]
    fn labels_distinguish_failure_classes() {
        assert_eq!(TunnelError::ChainMissing.error_type(), ERROR_PROTOCOL);
        assert_eq!(TunnelError::ReadinessTimeout.error_type(), ERROR_TIMEOUT);
        assert_eq!(
            TunnelError::PeerCertInvalid(VerifyError::UnknownAuthority).error_type(),
            ERROR_PEER_CERT
        );
        assert_eq!(
            TunnelError::ResourceNotFound {
                host: "db".into(),
                port: 1
            }
            .error_type(),
            ERROR_RESOURCE
        );
    }
}
