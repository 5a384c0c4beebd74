//! CLI override definitions and application logic.

use clap::Parser;

use crate::Config;

#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override listen host, e.g. 127.0.0.1
    #[arg(long)]
    pub listen_host: Option<String>,
    /// Override certificate PEM path
    #[arg(long)]
    pub cert: Option<String>,
    /// Override private key PEM path
    #[arg(long)]
    pub key: Option<String>,
    /// Override trust root PEM path
    #[arg(long)]
    pub ca: Option<String>,
    /// Override dial timeout (seconds)
    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,
    /// Wait at most this long for the readiness token (seconds)
    #[arg(long)]
    pub readiness_timeout_secs: Option<u64>,
    /// Override graceful shutdown timeout (seconds)
    #[arg(long)]
    pub shutdown_timeout_secs: Option<u64>,
    /// Buffer size for forwarding (bytes)
    #[arg(long)]
    pub relay_buffer_size: Option<usize>,
    /// Override metrics listen address
    #[arg(long)]
    pub metrics_listen: Option<String>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.listen_host {
        config.tunnel.listen_host = v.clone();
    }
    // A path given on the command line beats anything inline in the file.
    if let Some(v) = &overrides.cert {
        config.certificate.cert_pem = None;
        config.certificate.cert_pem_path = Some(v.clone());
    }
    if let Some(v) = &overrides.key {
        config.certificate.key_pem = None;
        config.certificate.key_pem_path = Some(v.clone());
    }
    if let Some(v) = &overrides.ca {
        config.certificate.ca_pem = None;
        config.certificate.ca_pem_path = Some(v.clone());
    }
    if let Some(v) = overrides.connect_timeout_secs {
        config.tunnel.connect_timeout_secs = v;
    }
    if let Some(v) = overrides.readiness_timeout_secs {
        config.tunnel.readiness_timeout_secs = Some(v);
    }
    if let Some(v) = overrides.shutdown_timeout_secs {
        config.tunnel.shutdown_timeout_secs = v;
    }
    if let Some(v) = overrides.relay_buffer_size {
        config.tunnel.relay_buffer_size = v;
    }
    if let Some(v) = &overrides.metrics_listen {
        config.metrics.listen = Some(v.clone());
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
}
