//! Configuration validation logic.

use std::net::IpAddr;

use crate::defaults::MIN_HEADER_BYTES;
use crate::loader::ConfigError;
use crate::Config;

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let tunnel = &config.tunnel;
    if tunnel.listen_host.parse::<IpAddr>().is_err() {
        return Err(ConfigError::Validation(format!(
            "tunnel.listen_host must be an IP address, got {:?}",
            tunnel.listen_host
        )));
    }
    if tunnel.relay_buffer_size == 0 {
        return Err(ConfigError::Validation(
            "tunnel.relay_buffer_size must be > 0".into(),
        ));
    }
    if tunnel.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "tunnel.connect_timeout_secs must be > 0".into(),
        ));
    }
    if tunnel.readiness_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "tunnel.readiness_timeout_secs must be > 0 when set".into(),
        ));
    }
    if tunnel.max_header_bytes < MIN_HEADER_BYTES {
        return Err(ConfigError::Validation(format!(
            "tunnel.max_header_bytes too small (min {})",
            MIN_HEADER_BYTES
        )));
    }
    if let Some(format) = config.logging.format.as_deref() {
        if !matches!(format, "json" | "pretty" | "compact") {
            return Err(ConfigError::Validation(format!(
                "logging.format must be json, pretty or compact, got {format:?}"
            )));
        }
    }
    if let Some(output) = config.logging.output.as_deref() {
        if !matches!(output, "stdout" | "stderr") {
            return Err(ConfigError::Validation(format!(
                "logging.output must be stdout or stderr, got {output:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        validate_config(&Config::default()).unwrap();
    }

    #[test]
    fn hostname_listen_host_is_rejected() {
        let mut cfg = Config::default();
        cfg.tunnel.listen_host = "localhost".into();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let mut cfg = Config::default();
        cfg.tunnel.connect_timeout_secs = 0;
        assert!(validate_config(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.tunnel.readiness_timeout_secs = Some(0);
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn tiny_header_limit_is_rejected() {
        let mut cfg = Config::default();
        cfg.tunnel.max_header_bytes = 512;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let mut cfg = Config::default();
        cfg.logging.format = Some("xml".into());
        assert!(validate_config(&cfg).is_err());
    }
}
