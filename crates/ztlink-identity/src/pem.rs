//! PEM decoding for in-memory certificate material.

use der::Decode;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use x509_cert::Certificate;

/// Decode every certificate in `pem`, checking each is well-formed X.509.
///
/// Fails if the text holds no certificate at all.
pub fn parse_certs(pem: &str) -> Result<Vec<CertificateDer<'static>>, String> {
    let certs = rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid PEM: {e}"))?;
    if certs.is_empty() {
        return Err("no certificate found in PEM".into());
    }
    for cert in &certs {
        Certificate::from_der(cert.as_ref()).map_err(|e| format!("invalid certificate: {e}"))?;
    }
    Ok(certs)
}

/// Decode the first private key in `pem` (PKCS#8, PKCS#1 or SEC1).
pub fn parse_private_key(pem: &str) -> Result<PrivateKeyDer<'static>, String> {
    let mut reader = pem.as_bytes();
    loop {
        match rustls_pemfile::read_one(&mut reader).map_err(|e| format!("invalid PEM: {e}"))? {
            Some(rustls_pemfile::Item::Pkcs8Key(key)) => return Ok(PrivateKeyDer::Pkcs8(key)),
            Some(rustls_pemfile::Item::Pkcs1Key(key)) => return Ok(PrivateKeyDer::Pkcs1(key)),
            Some(rustls_pemfile::Item::Sec1Key(key)) => return Ok(PrivateKeyDer::Sec1(key)),
            Some(_) => continue,
            None => break,
        }
    }
    Err("no private key found in PEM".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestCa;

    #[test]
    fn parses_generated_material() {
        let ca = TestCa::new("pem test root");
        let issued = ca.issue(&serde_json::json!({"type": "server"}));

        assert_eq!(parse_certs(&issued.cert_pem).unwrap().len(), 1);
        assert!(parse_private_key(&issued.key_pem).is_ok());
    }

    #[test]
    fn rejects_text_without_certificates() {
        assert!(parse_certs("hello").is_err());
        assert!(parse_certs("").is_err());
    }

    #[test]
    fn rejects_garbage_inside_pem_armor() {
        let pem = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        assert!(parse_certs(pem).is_err());
    }

    #[test]
    fn missing_key_is_an_error() {
        let ca = TestCa::new("pem test root");
        assert!(parse_private_key(&ca.cert_pem).is_err());
    }
}
