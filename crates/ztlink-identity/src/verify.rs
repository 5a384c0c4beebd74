//! Peer certificate verification against the overlay trust root.
//!
//! Outbound peers (responders) are checked as servers for the host we dialed.
//! Inbound peers (initiators) are checked by chain only: a relay forwards with
//! the same certificate it serves TLS with, so either client or server usage
//! is accepted.

use std::net::IpAddr;
use std::sync::Arc;

use der::Decode;
use rustls::client::danger::ServerCertVerifier;
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::danger::ClientCertVerifier;
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::SubjectAltName;
use x509_cert::Certificate;

use crate::error::VerifyError;
use crate::pem::parse_certs;

const SUBJECT_ALT_NAME_OID: &str = "2.5.29.17";

/// Verifier bound to one trust root, built once and shared.
#[derive(Clone)]
pub struct PeerVerifier {
    roots: Arc<RootCertStore>,
    as_server: Arc<WebPkiServerVerifier>,
    as_client: Arc<dyn ClientCertVerifier>,
}

impl std::fmt::Debug for PeerVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerVerifier")
            .field("roots", &self.roots.len())
            .finish()
    }
}

impl PeerVerifier {
    /// Build from the trust root PEM (one or more CA certificates).
    pub fn new(root_pem: &str) -> Result<Self, VerifyError> {
        let mut store = RootCertStore::empty();
        for cert in parse_certs(root_pem).map_err(VerifyError::CertParse)? {
            store
                .add(cert)
                .map_err(|e| VerifyError::CertParse(format!("unusable trust root: {e}")))?;
        }
        let roots = Arc::new(store);
        let provider = crate::crypto_provider();

        let as_server = WebPkiServerVerifier::builder_with_provider(roots.clone(), provider.clone())
            .build()
            .map_err(|e| VerifyError::Invalid(format!("server verifier: {e}")))?;
        let as_client = WebPkiClientVerifier::builder_with_provider(roots.clone(), provider)
            .build()
            .map_err(|e| VerifyError::Invalid(format!("client verifier: {e}")))?;

        Ok(Self {
            roots,
            as_server,
            as_client,
        })
    }

    /// Shared root store, for TLS client configuration.
    pub fn roots(&self) -> Arc<RootCertStore> {
        self.roots.clone()
    }

    /// Verify `leaf_pem` (leaf first, optional intermediates after it).
    ///
    /// With `dns_name`, the leaf must also be valid for that host (DNS name or
    /// IP literal). Without it, only the chain is checked and the leaf may be
    /// issued for client or server authentication.
    pub fn verify(&self, leaf_pem: &str, dns_name: Option<&str>) -> Result<(), VerifyError> {
        let chain = parse_certs(leaf_pem).map_err(VerifyError::CertParse)?;
        let (end_entity, intermediates) = split_chain(&chain)?;
        let now = UnixTime::now();

        match dns_name {
            Some(name) => {
                let server_name = ServerName::try_from(name.to_string())
                    .map_err(|e| VerifyError::Invalid(format!("invalid peer name {name:?}: {e}")))?;
                self.as_server
                    .verify_server_cert(end_entity, intermediates, &server_name, &[], now)?;
            }
            None => self.verify_unnamed(end_entity, intermediates, now)?,
        }
        Ok(())
    }

    fn verify_unnamed(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> Result<(), VerifyError> {
        let client_err = match self.as_client.verify_client_cert(end_entity, intermediates, now) {
            Ok(_) => return Ok(()),
            Err(e) => VerifyError::from(e),
        };
        if !matches!(client_err, VerifyError::Invalid(_)) {
            return Err(client_err);
        }

        // Server-usage leaves: check them as a server under one of their own
        // names, which leaves chain, validity and usage as the real checks.
        let Some(own_name) = first_subject_name(end_entity) else {
            return Err(client_err);
        };
        match self
            .as_server
            .verify_server_cert(end_entity, intermediates, &own_name, &[], now)
        {
            Ok(_) => Ok(()),
            Err(e) => match VerifyError::from(e) {
                VerifyError::UnknownAuthority => Err(VerifyError::UnknownAuthority),
                _ => Err(client_err),
            },
        }
    }
}

/// First DNS name or IP address in the leaf's subjectAltName.
fn first_subject_name(leaf: &CertificateDer<'_>) -> Option<ServerName<'static>> {
    let cert = Certificate::from_der(leaf.as_ref()).ok()?;
    let ext = cert
        .tbs_certificate
        .extensions
        .as_ref()?
        .iter()
        .find(|ext| ext.extn_id.to_string() == SUBJECT_ALT_NAME_OID)?;
    let names = SubjectAltName::from_der(ext.extn_value.as_bytes()).ok()?;

    names.0.iter().find_map(|name| match name {
        GeneralName::DnsName(dns) => ServerName::try_from(dns.to_string()).ok(),
        GeneralName::IpAddress(octets) => ip_from_octets(octets.as_bytes()).map(ServerName::from),
        _ => None,
    })
}

fn ip_from_octets(octets: &[u8]) -> Option<IpAddr> {
    match octets.len() {
        4 => <[u8; 4]>::try_from(octets).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(octets).ok().map(IpAddr::from),
        _ => None,
    }
}

fn split_chain<'a>(
    chain: &'a [CertificateDer<'static>],
) -> Result<(&'a CertificateDer<'static>, &'a [CertificateDer<'static>]), VerifyError> {
    chain
        .split_first()
        .ok_or_else(|| VerifyError::CertParse("empty certificate chain".into()))
}

/// One-shot verification of `leaf_pem` against `root_pem`.
///
/// Prefer a long-lived [`PeerVerifier`] on hot paths.
pub fn verify_peer_certificate(
    leaf_pem: &str,
    root_pem: &str,
    dns_name: Option<&str>,
) -> Result<(), VerifyError> {
    PeerVerifier::new(root_pem)?.verify(leaf_pem, dns_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestCa;
    use rcgen::ExtendedKeyUsagePurpose;
    use serde_json::json;

    #[test]
    fn accepts_leaf_from_trusted_root() {
        let ca = TestCa::new("verify root");
        let leaf = ca.issue(&json!({"type": "relay"}));

        verify_peer_certificate(&leaf.cert_pem, &ca.cert_pem, None).unwrap();
        verify_peer_certificate(&leaf.cert_pem, &ca.cert_pem, Some("localhost")).unwrap();
        verify_peer_certificate(&leaf.cert_pem, &ca.cert_pem, Some("127.0.0.1")).unwrap();
    }

    #[test]
    fn foreign_root_is_unknown_authority() {
        let ours = TestCa::new("ours");
        let theirs = TestCa::new("theirs");
        let leaf = theirs.issue(&json!({"type": "client"}));

        let err = verify_peer_certificate(&leaf.cert_pem, &ours.cert_pem, None).unwrap_err();
        assert!(matches!(err, VerifyError::UnknownAuthority), "got {err:?}");

        let err =
            verify_peer_certificate(&leaf.cert_pem, &ours.cert_pem, Some("localhost")).unwrap_err();
        assert!(matches!(err, VerifyError::UnknownAuthority), "got {err:?}");
    }

    #[test]
    fn malformed_leaf_is_parse_error() {
        let ca = TestCa::new("verify root");
        let err = verify_peer_certificate("not a certificate", &ca.cert_pem, None).unwrap_err();
        assert!(matches!(err, VerifyError::CertParse(_)), "got {err:?}");
    }

    #[test]
    fn malformed_root_is_parse_error() {
        let ca = TestCa::new("verify root");
        let leaf = ca.issue(&json!({"type": "client"}));
        let err = verify_peer_certificate(&leaf.cert_pem, "garbage", None).unwrap_err();
        assert!(matches!(err, VerifyError::CertParse(_)), "got {err:?}");
    }

    #[test]
    fn wrong_host_is_invalid_not_unknown_authority() {
        let ca = TestCa::new("verify root");
        let leaf = ca.issue(&json!({"type": "server"}));
        let err =
            verify_peer_certificate(&leaf.cert_pem, &ca.cert_pem, Some("example.com")).unwrap_err();
        assert!(matches!(err, VerifyError::Invalid(_)), "got {err:?}");
    }

    #[test]
    fn server_usage_leaf_is_accepted_without_a_name() {
        let ca = TestCa::new("verify root");
        let leaf = ca.issue_with_usages(&json!({"type": "relay"}), &[ExtendedKeyUsagePurpose::ServerAuth]);

        verify_peer_certificate(&leaf.cert_pem, &ca.cert_pem, None).unwrap();
        verify_peer_certificate(&leaf.cert_pem, &ca.cert_pem, Some("localhost")).unwrap();
    }

    #[test]
    fn client_usage_leaf_is_accepted_without_a_name() {
        let ca = TestCa::new("verify root");
        let leaf = ca.issue_with_usages(&json!({"type": "client"}), &[ExtendedKeyUsagePurpose::ClientAuth]);
        verify_peer_certificate(&leaf.cert_pem, &ca.cert_pem, None).unwrap();
    }

    #[test]
    fn unrelated_usage_is_invalid() {
        let ca = TestCa::new("verify root");
        let leaf = ca.issue_with_usages(&json!({"type": "relay"}), &[ExtendedKeyUsagePurpose::CodeSigning]);
        let err = verify_peer_certificate(&leaf.cert_pem, &ca.cert_pem, None).unwrap_err();
        assert!(matches!(err, VerifyError::Invalid(_)), "got {err:?}");
    }

    #[test]
    fn foreign_server_usage_leaf_is_unknown_authority() {
        let ours = TestCa::new("ours");
        let theirs = TestCa::new("theirs");
        let leaf = theirs.issue_with_usages(&json!({"type": "relay"}), &[ExtendedKeyUsagePurpose::ServerAuth]);
        let err = verify_peer_certificate(&leaf.cert_pem, &ours.cert_pem, None).unwrap_err();
        assert!(matches!(err, VerifyError::UnknownAuthority), "got {err:?}");
    }

    #[test]
    fn verifier_is_reusable() {
        let ca = TestCa::new("verify root");
        let verifier = PeerVerifier::new(&ca.cert_pem).unwrap();
        for role in ["client", "relay", "server"] {
            let leaf = ca.issue(&json!({ "type": role }));
            verifier.verify(&leaf.cert_pem, None).unwrap();
        }
        assert_eq!(verifier.roots().len(), 1);
    }
}
