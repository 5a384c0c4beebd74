//! Metrics collection and Prometheus exporter for ztlink.
//!
//! Every hop role records here: accepted connections, handshake latency and
//! outcome, forwarded bytes, errors and emitted events.

mod error;

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

pub use error::MetricsError;

/// Initialize Prometheus metrics exporter.
///
/// Starts an HTTP server on the given address to expose metrics.
pub fn init_prometheus(listen: &str) -> Result<(), MetricsError> {
    let addr: SocketAddr = listen.parse().map_err(|source| MetricsError::InvalidAddress {
        addr: listen.to_string(),
        source,
    })?;

    PrometheusBuilder::new().with_http_listener(addr).install()?;
    Ok(())
}

// ============================================================================
// Metric Names
// ============================================================================

/// Total number of TCP connections accepted.
pub const CONNECTIONS_TOTAL: &str = "ztlink_connections_total";
/// Number of currently active connections.
pub const CONNECTIONS_ACTIVE: &str = "ztlink_connections_active";
/// Connection duration histogram (seconds).
pub const CONNECTION_DURATION_SECONDS: &str = "ztlink_connection_duration_seconds";
/// Time from accept to forwarding (or failure), seconds.
pub const HANDSHAKE_DELAY_SECONDS: &str = "ztlink_handshake_delay_seconds";
/// Handshakes by operator and outcome.
pub const HANDSHAKES_TOTAL: &str = "ztlink_handshakes_total";
/// Bytes forwarded, by direction.
pub const BYTES_FORWARDED_TOTAL: &str = "ztlink_bytes_forwarded_total";
/// Total number of errors by type.
pub const ERRORS_TOTAL: &str = "ztlink_errors_total";
/// Operational events by tag.
pub const EVENTS_TOTAL: &str = "ztlink_events_total";

// ============================================================================
// Metric Recording Functions
// ============================================================================

#[inline]
pub fn record_connection_accepted() {
    counter!(CONNECTIONS_TOTAL).increment(1);
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

#[inline]
pub fn record_connection_closed(duration_secs: f64) {
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(CONNECTION_DURATION_SECONDS).record(duration_secs);
}

/// Record one handshake outcome (`status` is `"success"` or `"fail"`).
#[inline]
pub fn record_handshake(operator: &'static str, status: &'static str, id: &str, name: &str, secs: f64) {
    histogram!(
        HANDSHAKE_DELAY_SECONDS,
        "operator" => operator,
        "status" => status,
        "id" => id.to_string(),
        "name" => name.to_string()
    )
    .record(secs);
    counter!(HANDSHAKES_TOTAL, "operator" => operator, "status" => status).increment(1);
}

/// Record forwarded bytes (direction: "upstream" or "downstream").
#[inline]
pub fn record_bytes_forwarded(direction: &'static str, bytes: u64) {
    counter!(BYTES_FORWARDED_TOTAL, "direction" => direction).increment(bytes);
}

#[inline]
pub fn record_error(error_type: &'static str) {
    counter!(ERRORS_TOTAL, "type" => error_type).increment(1);
}

#[inline]
pub fn record_event(tag: &'static str) {
    counter!(EVENTS_TOTAL, "tag" => tag).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_listen_address() {
        let err = init_prometheus("not-an-address").unwrap_err();
        assert!(matches!(err, MetricsError::InvalidAddress { .. }), "got {err:?}");
    }

    #[test]
    fn recording_without_exporter_is_harmless() {
        record_connection_accepted();
        record_handshake("relay", "success", "r-1", "edge", 0.01);
        record_bytes_forwarded("upstream", 42);
        record_error("io");
        record_event("Connect success");
        record_connection_closed(0.5);
    }
}
