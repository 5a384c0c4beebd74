//! Throwaway CA and role certificates for tests.

use std::net::{IpAddr, Ipv4Addr};

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CustomExtension, DnType, ExtendedKeyUsagePurpose,
    IsCa, KeyPair, KeyUsagePurpose, SanType, PKCS_ECDSA_P256_SHA256,
};

/// Arc components of [`crate::IDENTITY_EXTENSION_OID`].
const IDENTITY_OID_ARCS: &[u64] = &[1, 2, 3, 4, 5, 6, 7, 8, 1];

/// A certificate and its private key, both PEM.
#[derive(Debug, Clone)]
pub struct IssuedCert {
    pub cert_pem: String,
    pub key_pem: String,
}

/// An in-memory certificate authority.
pub struct TestCa {
    cert: Certificate,
    key: KeyPair,
    pub cert_pem: String,
}

impl TestCa {
    pub fn new(common_name: &str) -> Self {
        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).expect("generate CA key");
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let cert = params.self_signed(&key).expect("self-sign CA");
        let cert_pem = cert.pem();
        Self {
            cert,
            key,
            cert_pem,
        }
    }

    /// Issue a TLS server leaf for `localhost` / `127.0.0.1` carrying `attrs`
    /// in the identity extension.
    pub fn issue(&self, attrs: &serde_json::Value) -> IssuedCert {
        self.issue_with_usages(attrs, &[ExtendedKeyUsagePurpose::ServerAuth])
    }

    /// Like [`TestCa::issue`] with explicit extended key usages. An empty
    /// slice leaves the extension out.
    pub fn issue_with_usages(&self, attrs: &serde_json::Value, usages: &[ExtendedKeyUsagePurpose]) -> IssuedCert {
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, "ztlink node");
        params.subject_alt_names = vec![
            SanType::DnsName("localhost".try_into().expect("valid dns name")),
            SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        ];
        params.extended_key_usages = usages.to_vec();
        params
            .custom_extensions
            .push(identity_extension(&serde_json::json!({ "attrs": attrs })));
        self.sign(params)
    }

    /// Issue a leaf with no identity extension.
    pub fn issue_plain(&self) -> IssuedCert {
        let mut params = CertificateParams::default();
        params.subject_alt_names = vec![SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST))];
        self.sign(params)
    }

    /// Issue a leaf whose identity extension holds `raw` verbatim.
    pub fn issue_raw_extension(&self, raw: &[u8]) -> IssuedCert {
        let mut params = CertificateParams::default();
        params
            .custom_extensions
            .push(CustomExtension::from_oid_content(IDENTITY_OID_ARCS, raw.to_vec()));
        self.sign(params)
    }

    fn sign(&self, params: CertificateParams) -> IssuedCert {
        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).expect("generate leaf key");
        let cert = params
            .signed_by(&key, &self.cert, &self.key)
            .expect("sign leaf");
        IssuedCert {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        }
    }
}

fn identity_extension(doc: &serde_json::Value) -> CustomExtension {
    CustomExtension::from_oid_content(IDENTITY_OID_ARCS, doc.to_string().into_bytes())
}
