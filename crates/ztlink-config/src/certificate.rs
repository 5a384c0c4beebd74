//! Resolution of the node's certificate material.

use std::fs;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ztlink_identity::TrustMaterial;

use crate::loader::ConfigError;
use crate::types::CertificateConfig;

/// Environment variable holding the base64 certificate PEM.
pub const CERT_PEM_ENV: &str = "CERT_PEM";
/// Environment variable holding the base64 private key PEM.
pub const KEY_PEM_ENV: &str = "KEY_PEM";
/// Environment variable holding the base64 trust root PEM.
pub const CA_PEM_ENV: &str = "CA_PEM";

/// Resolve certificate material using the process environment.
pub fn resolve_certificates(cfg: &CertificateConfig) -> Result<TrustMaterial, ConfigError> {
    resolve_certificates_with(cfg, |name| std::env::var(name).ok())
}

/// Resolve certificate material with an explicit environment lookup.
///
/// The key is optional here; roles that terminate TLS check for it.
pub fn resolve_certificates_with<F>(cfg: &CertificateConfig, env: F) -> Result<TrustMaterial, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let cert_pem = resolve_one("certificate", &cfg.cert_pem, CERT_PEM_ENV, &cfg.cert_pem_path, &env)?
        .ok_or_else(|| ConfigError::Certificate("no certificate configured".into()))?;
    let ca_pem = resolve_one("trust root", &cfg.ca_pem, CA_PEM_ENV, &cfg.ca_pem_path, &env)?
        .ok_or_else(|| ConfigError::Certificate("no trust root configured".into()))?;
    let key_pem = resolve_one("private key", &cfg.key_pem, KEY_PEM_ENV, &cfg.key_pem_path, &env)?;

    Ok(TrustMaterial {
        cert_pem,
        key_pem,
        ca_pem,
    })
}

fn resolve_one<F>(
    what: &str,
    inline: &Option<String>,
    env_name: &str,
    path: &Option<String>,
    env: &F,
) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(pem) = inline.as_ref().filter(|s| !s.trim().is_empty()) {
        return Ok(Some(pem.clone()));
    }
    if let Some(encoded) = env(env_name).filter(|s| !s.trim().is_empty()) {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ConfigError::Certificate(format!("{env_name}: invalid base64: {e}")))?;
        let pem = String::from_utf8(raw)
            .map_err(|_| ConfigError::Certificate(format!("{env_name}: not UTF-8 PEM")))?;
        return Ok(Some(pem));
    }
    if let Some(path) = path.as_ref().filter(|s| !s.trim().is_empty()) {
        let pem = fs::read_to_string(path)
            .map_err(|e| ConfigError::Certificate(format!("{what} {path}: {e}")))?;
        return Ok(Some(pem));
    }
    Ok(None)
}
