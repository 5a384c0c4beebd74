//! Identity and trust for overlay nodes.
//!
//! Every node carries a certificate issued by the overlay CA. The certificate
//! proves membership (chain verification against the CA) and carries the
//! node's role plus role-specific attributes in a custom extension.
//!
//! - [`verify`]: chain verification with distinct "unknown authority" errors.
//! - [`role`]: role and attribute extraction from the identity extension.
//! - [`pem`]: PEM decoding shared by verification and TLS setup.

pub mod error;
pub mod pem;
pub mod role;
pub mod verify;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

use std::sync::Arc;

use rustls::crypto::CryptoProvider;

pub use error::{IdentityError, VerifyError};
pub use role::{extract_role, Identity, Role, IDENTITY_EXTENSION_OID};
pub use verify::{verify_peer_certificate, PeerVerifier};

/// Certificate material of the local node, loaded once at startup.
#[derive(Clone)]
pub struct TrustMaterial {
    /// Own certificate (PEM), presented inline to peers.
    pub cert_pem: String,
    /// Own private key (PEM). Required for roles that terminate TLS.
    pub key_pem: Option<String>,
    /// Overlay trust root (PEM).
    pub ca_pem: String,
}

impl std::fmt::Debug for TrustMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustMaterial")
            .field("cert_pem", &format_args!("<{} bytes>", self.cert_pem.len()))
            .field("key_pem", &self.key_pem.as_ref().map(|_| "<redacted>"))
            .field("ca_pem", &format_args!("<{} bytes>", self.ca_pem.len()))
            .finish()
    }
}

/// The installed process-wide crypto provider, or aws-lc-rs.
pub fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}
