//! Error type constants for metrics and logging.
//!
//! These constants provide consistent error classification across all crates.

/// TLS handshake error.
pub const ERROR_TLS_HANDSHAKE: &str = "tls_handshake";
/// Protocol parsing/validation error.
pub const ERROR_PROTOCOL: &str = "protocol";
/// Upgrade handshake rejected or malformed.
pub const ERROR_HANDSHAKE: &str = "handshake";
/// Peer certificate missing, malformed or untrusted.
pub const ERROR_PEER_CERT: &str = "peer_cert";
/// Own certificate unusable (parse or role).
pub const ERROR_CERT: &str = "cert";
/// Target not on the resource allowlist.
pub const ERROR_RESOURCE: &str = "resource";
/// Dial to next hop or target failed.
pub const ERROR_DIAL: &str = "dial";
/// I/O error.
pub const ERROR_IO: &str = "io";
/// Timeout error.
pub const ERROR_TIMEOUT: &str = "timeout";
/// Configuration error.
pub const ERROR_CONFIG: &str = "config";
