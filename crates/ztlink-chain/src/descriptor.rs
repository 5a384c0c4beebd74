//! The chain descriptor carried in the `X-Chains` header.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ChainError;
use crate::null_as_default;

/// Full path of one client, as issued in its certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Local port the client listens on.
    #[serde(default)]
    pub port: u16,
    /// Relays in traversal order once parsed.
    #[serde(default, rename = "relay", deserialize_with = "null_as_default")]
    pub relays: Vec<RelayHop>,
    #[serde(default)]
    pub server: ServerEndpoint,
    #[serde(default)]
    pub target: Target,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayHop {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    /// Port other hops dial to reach this relay.
    #[serde(default)]
    pub out_port: u16,
    #[serde(default)]
    pub sort: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub out_port: u16,
}

/// The application endpoint behind the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
}

impl Target {
    /// `host:port`, bracketing IPv6 literals.
    pub fn addr(&self) -> String {
        crate::router::join_host_port(&self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
}

/// Targets a server is willing to reach.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resources(pub Vec<Resource>);

impl Resources {
    /// True if an entry names exactly this host (ASCII case-insensitive) and port.
    pub fn allows(&self, target: &Target) -> bool {
        self.0
            .iter()
            .any(|r| r.port == target.port && r.host.eq_ignore_ascii_case(&target.host))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ChainDescriptor {
    /// Parse the JSON form, then normalize.
    pub fn parse(json: &str) -> Result<Self, ChainError> {
        let descriptor: Self = serde_json::from_str(json)?;
        descriptor.normalized()
    }

    /// Build from certificate attributes (the attribute map is the descriptor).
    pub fn from_attrs(attrs: &Map<String, Value>) -> Result<Self, ChainError> {
        let descriptor: Self = serde_json::from_value(Value::Object(attrs.clone()))?;
        descriptor.normalized()
    }

    /// Compact JSON for the `X-Chains` header.
    pub fn to_json(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Sort relays ascending by `sort` (stable) and require a server host.
    fn normalized(mut self) -> Result<Self, ChainError> {
        self.relays.sort_by_key(|r| r.sort);
        if self.server.host.is_empty() {
            return Err(ChainError::MissingServerHost);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "uuid": "c-1",
            "name": "laptop",
            "type": "client",
            "port": 1080,
            "relay": [
                {"uuid": "r-3", "host": "r3.example", "out_port": 4003, "sort": 3},
                {"uuid": "r-1", "host": "r1.example", "out_port": 4001, "sort": 1},
                {"uuid": "r-2", "host": "r2.example", "out_port": 4002, "sort": 2}
            ],
            "server": {"uuid": "s-1", "host": "srv.example", "port": 443, "out_port": 8443},
            "target": {"host": "db.internal", "port": 5432}
        })
    }

    #[test]
    fn parse_orders_relays_by_sort() {
        let chain = ChainDescriptor::parse(&sample().to_string()).unwrap();
        let order: Vec<_> = chain.relays.iter().map(|r| r.uuid.as_str()).collect();
        assert_eq!(order, ["r-1", "r-2", "r-3"]);
        assert_eq!(chain.server.out_port, 8443);
        assert_eq!(chain.target.addr(), "db.internal:5432");
    }

    #[test]
    fn equal_sort_keys_keep_issue_order() {
        let doc = json!({
            "relay": [
                {"uuid": "a", "sort": 1},
                {"uuid": "b", "sort": 0},
                {"uuid": "c", "sort": 1}
            ],
            "server": {"host": "srv"}
        });
        let chain = ChainDescriptor::parse(&doc.to_string()).unwrap();
        let order: Vec<_> = chain.relays.iter().map(|r| r.uuid.as_str()).collect();
        assert_eq!(order, ["b", "a", "c"]);
    }

    #[test]
    fn empty_server_host_is_rejected() {
        let doc = json!({"server": {"host": ""}, "target": {"host": "x", "port": 1}});
        assert!(matches!(
            ChainDescriptor::parse(&doc.to_string()),
            Err(ChainError::MissingServerHost)
        ));
        assert!(matches!(
            ChainDescriptor::parse("{}"),
            Err(ChainError::MissingServerHost)
        ));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            ChainDescriptor::parse("{\"server\":"),
            Err(ChainError::Json(_))
        ));
    }

    #[test]
    fn null_lists_read_as_empty() {
        let doc = json!({"relay": null, "resources": null, "server": {"host": "srv"}});
        let chain = ChainDescriptor::parse(&doc.to_string()).unwrap();
        assert!(chain.relays.is_empty());
        assert!(chain.resources.is_empty());
    }

    #[test]
    fn survives_the_wire_unchanged() {
        let chain = ChainDescriptor::parse(&sample().to_string()).unwrap();
        let again = ChainDescriptor::parse(&chain.to_json().unwrap()).unwrap();
        assert_eq!(chain, again);
    }

    #[test]
    fn hostnames_keep_their_case() {
        let doc = json!({"server": {"host": "Srv.Example"}, "target": {"host": "DB", "port": 1}});
        let chain = ChainDescriptor::parse(&doc.to_string()).unwrap();
        assert_eq!(chain.server.host, "Srv.Example");
        assert_eq!(chain.target.host, "DB");
    }

    #[test]
    fn from_attrs_matches_parse() {
        let Value::Object(attrs) = sample() else {
            unreachable!()
        };
        let a = ChainDescriptor::from_attrs(&attrs).unwrap();
        let b = ChainDescriptor::parse(&sample().to_string()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn resource_allowlist_is_exact() {
        let resources = Resources(vec![
            Resource {
                host: "db.internal".into(),
                port: 5432,
                ..Default::default()
            },
            Resource {
                host: "10.0.0.7".into(),
                port: 22,
                ..Default::default()
            },
        ]);
        let target = |host: &str, port| Target {
            host: host.into(),
            port,
        };

        assert!(resources.allows(&target("db.internal", 5432)));
        assert!(resources.allows(&target("DB.Internal", 5432)));
        assert!(resources.allows(&target("10.0.0.7", 22)));
        assert!(!resources.allows(&target("db.internal", 5433)));
        assert!(!resources.allows(&target("internal", 5432)));
        assert!(!resources.allows(&target("db.internal.evil", 5432)));
        assert!(!Resources::default().allows(&target("db.internal", 5432)));
    }
}
