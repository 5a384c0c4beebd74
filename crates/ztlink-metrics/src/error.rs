//! Error types for the metrics crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("invalid metrics listen address {addr:?}: {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to install prometheus exporter: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
