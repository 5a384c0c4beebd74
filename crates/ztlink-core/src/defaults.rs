//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Timeout Defaults
// ============================================================================

/// Default dial timeout for the next hop or the target, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Default graceful shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Buffer/Size Defaults
// ============================================================================

/// Default maximum bytes accepted for an upgrade request or response head.
///
/// Large enough for a base64 certificate chain plus a chain descriptor.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 65536;
/// Default forwarding buffer size per direction (32 KiB).
pub const DEFAULT_RELAY_BUFFER_SIZE: usize = 32768;
/// Default in-memory pipe capacity backing one multiplexed stream.
pub const DEFAULT_MUX_STREAM_BUFFER: usize = 65536;

// ============================================================================
// Connection Defaults
// ============================================================================

/// Default TCP listener backlog.
pub const DEFAULT_CONNECTION_BACKLOG: u32 = 1024;
/// Default listen host (all interfaces).
pub const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";

// ============================================================================
// Protocol Constants
// ============================================================================

/// Request path of the upgrade handshake.
pub const UPGRADE_PATH: &str = "/secretLink";
/// Prefix every valid upgrade request starts with.
pub const UPGRADE_REQUEST_PREFIX: &[u8] = b"GET /secretLink";
/// Token the initiator writes once it has verified the responder.
pub const READINESS_TOKEN: &[u8] = b"serverCaReady";
