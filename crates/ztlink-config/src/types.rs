//! Configuration types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub certificate: CertificateConfig,
    #[serde(default)]
    pub tunnel: TunnelConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the node's certificate, key and trust root come from.
///
/// Each item is taken from the inline value, else the base64 environment
/// variable, else the file path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificateConfig {
    #[serde(default)]
    pub cert_pem: Option<String>,
    #[serde(default)]
    pub key_pem: Option<String>,
    #[serde(default)]
    pub ca_pem: Option<String>,
    #[serde(default)]
    pub cert_pem_path: Option<String>,
    #[serde(default)]
    pub key_pem_path: Option<String>,
    #[serde(default)]
    pub ca_pem_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Address to bind; the port comes from the certificate.
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    #[serde(default = "default_relay_buffer_size")]
    pub relay_buffer_size: usize,
    /// Dial timeout for the next hop or the target.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Deadline for the readiness token. Unset means wait indefinitely.
    #[serde(default)]
    pub readiness_timeout_secs: Option<u64>,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    #[serde(default = "default_connection_backlog")]
    pub connection_backlog: u32,
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            listen_host: default_listen_host(),
            relay_buffer_size: default_relay_buffer_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
            readiness_timeout_secs: None,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            connection_backlog: default_connection_backlog(),
            max_header_bytes: default_max_header_bytes(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Prometheus exporter address; disabled when unset.
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"ztlink_tunnel": "debug", "rustls": "warn"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.tunnel.listen_host, "0.0.0.0");
        assert_eq!(cfg.tunnel.connect_timeout_secs, 10);
        assert_eq!(cfg.tunnel.shutdown_timeout_secs, 30);
        assert!(cfg.tunnel.readiness_timeout_secs.is_none());
        assert!(cfg.metrics.listen.is_none());
    }

    #[test]
    fn tunnel_section_overrides() {
        let cfg: Config = toml::from_str(
            r#"
[tunnel]
listen_host = "127.0.0.1"
readiness_timeout_secs = 5
relay_buffer_size = 8192
"#,
        )
        .unwrap();
        assert_eq!(cfg.tunnel.listen_host, "127.0.0.1");
        assert_eq!(cfg.tunnel.readiness_timeout_secs, Some(5));
        assert_eq!(cfg.tunnel.relay_buffer_size, 8192);
        assert_eq!(cfg.tunnel.connection_backlog, 1024);
    }

    #[test]
    fn logging_filters() {
        let cfg: Config = toml::from_str(
            r#"
[logging]
level = "debug"
format = "json"
filters = { rustls = "warn" }
"#,
        )
        .unwrap();
        assert_eq!(cfg.logging.level.as_deref(), Some("debug"));
        assert_eq!(cfg.logging.filters["rustls"], "warn");
    }
}
