//! Error types for identity handling.

use thiserror::Error;

/// Errors reading the local node's own identity.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Certificate PEM/DER or identity extension unreadable.
    #[error("certificate parse error: {0}")]
    CertParse(String),

    /// Identity extension present but the role is missing or unknown.
    #[error("certificate type error: {0}")]
    CertType(String),
}

/// Errors verifying a peer certificate against the trust root.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// Leaf or root could not be decoded.
    #[error("certificate parse error: {0}")]
    CertParse(String),

    /// The leaf does not chain to the trust root.
    #[error("certificate signed by unknown authority")]
    UnknownAuthority,

    /// Chains to the root but fails another check (expiry, name, usage).
    #[error("certificate invalid: {0}")]
    Invalid(String),
}

impl From<rustls::Error> for VerifyError {
    fn from(err: rustls::Error) -> Self {
        use rustls::CertificateError;

        match err {
            rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer) => {
                VerifyError::UnknownAuthority
            }
            rustls::Error::InvalidCertificate(CertificateError::BadEncoding) => {
                VerifyError::CertParse("bad certificate encoding".into())
            }
            other => VerifyError::Invalid(other.to_string()),
        }
    }
}
