//! Role extraction from the identity extension.
//!
//! The extension value is a JSON document `{"attrs": {...}}`. `attrs.type`
//! selects the role; the remaining attributes are the role's configuration.

use std::fmt;
use std::str::FromStr;

use der::Decode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use x509_cert::Certificate;

use crate::error::IdentityError;
use crate::pem::parse_certs;

/// OID of the certificate extension holding node attributes.
pub const IDENTITY_EXTENSION_OID: &str = "1.2.3.4.5.6.7.8.1";

/// Position of a node in the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Relay,
    Server,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Relay => "relay",
            Role::Server => "server",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "relay" => Ok(Role::Relay),
            "server" => Ok(Role::Server),
            other => Err(IdentityError::CertType(format!("unknown role {other:?}"))),
        }
    }
}

/// What the local certificate says about this node.
#[derive(Debug, Clone)]
pub struct Identity {
    pub role: Role,
    pub site_id: Option<String>,
    pub cluster_id: Option<String>,
    /// All attributes, including `type`.
    pub attrs: Map<String, Value>,
}

#[derive(Deserialize)]
struct AttributeDocument {
    #[serde(default)]
    attrs: Map<String, Value>,
}

/// Read role and attributes from the first certificate in `cert_pem`.
pub fn extract_role(cert_pem: &str) -> Result<Identity, IdentityError> {
    let chain = parse_certs(cert_pem).map_err(IdentityError::CertParse)?;
    let leaf = Certificate::from_der(chain[0].as_ref())
        .map_err(|e| IdentityError::CertParse(e.to_string()))?;

    let attrs = read_attributes(&leaf)?;
    let role = match attrs.get("type") {
        Some(Value::String(kind)) => kind.parse::<Role>()?,
        Some(other) => {
            return Err(IdentityError::CertType(format!(
                "role attribute is not a string: {other}"
            )));
        }
        None => return Err(IdentityError::CertType("role attribute missing".into())),
    };

    let text = |key: &str| attrs.get(key).and_then(Value::as_str).map(str::to_owned);
    let identity = Identity {
        role,
        site_id: text("site_id"),
        cluster_id: text("cluster_id"),
        attrs,
    };
    debug!(role = %identity.role, attrs = identity.attrs.len(), "identity extracted");
    Ok(identity)
}

fn read_attributes(cert: &Certificate) -> Result<Map<String, Value>, IdentityError> {
    let Some(extensions) = cert.tbs_certificate.extensions.as_ref() else {
        return Ok(Map::new());
    };
    let Some(ext) = extensions
        .iter()
        .find(|ext| ext.extn_id.to_string() == IDENTITY_EXTENSION_OID)
    else {
        return Ok(Map::new());
    };

    let doc: AttributeDocument = serde_json::from_slice(ext.extn_value.as_bytes())
        .map_err(|e| IdentityError::CertParse(format!("identity extension: {e}")))?;
    Ok(doc.attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestCa;
    use serde_json::json;

    #[test]
    fn extracts_each_role() {
        let ca = TestCa::new("role root");
        for (name, role) in [
            ("client", Role::Client),
            ("relay", Role::Relay),
            ("server", Role::Server),
        ] {
            let cert = ca.issue(&json!({ "type": name, "uuid": "n-1" }));
            let identity = extract_role(&cert.cert_pem).unwrap();
            assert_eq!(identity.role, role);
            assert_eq!(identity.attrs["uuid"], "n-1");
        }
    }

    #[test]
    fn carries_site_and_cluster() {
        let ca = TestCa::new("role root");
        let cert = ca.issue(&json!({"type": "relay", "site_id": "s1", "cluster_id": "c9"}));
        let identity = extract_role(&cert.cert_pem).unwrap();
        assert_eq!(identity.site_id.as_deref(), Some("s1"));
        assert_eq!(identity.cluster_id.as_deref(), Some("c9"));
    }

    #[test]
    fn unknown_role_is_type_error() {
        let ca = TestCa::new("role root");
        let cert = ca.issue(&json!({"type": "gateway"}));
        assert!(matches!(
            extract_role(&cert.cert_pem),
            Err(IdentityError::CertType(_))
        ));
    }

    #[test]
    fn missing_extension_is_type_error() {
        let ca = TestCa::new("role root");
        let cert = ca.issue_plain();
        assert!(matches!(
            extract_role(&cert.cert_pem),
            Err(IdentityError::CertType(_))
        ));
    }

    #[test]
    fn unreadable_extension_is_parse_error() {
        let ca = TestCa::new("role root");
        let cert = ca.issue_raw_extension(b"{not json");
        assert!(matches!(
            extract_role(&cert.cert_pem),
            Err(IdentityError::CertParse(_))
        ));
    }

    #[test]
    fn malformed_pem_is_parse_error() {
        assert!(matches!(
            extract_role("-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n"),
            Err(IdentityError::CertParse(_))
        ));
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Client, Role::Relay, Role::Server] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }
}
