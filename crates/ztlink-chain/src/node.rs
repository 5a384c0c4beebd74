//! Static configuration of relay and server nodes.
//!
//! Both are read from the node's own certificate attributes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::descriptor::Resources;
use crate::error::ChainError;
use crate::null_as_default;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Listen port.
    #[serde(default)]
    pub port: u16,
    /// Allowlist of reachable targets.
    #[serde(default, rename = "resource", deserialize_with = "null_as_default")]
    pub resources: Resources,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Listen port.
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub name: String,
    /// Identity used to find this relay's position in a chain.
    #[serde(default)]
    pub uuid: String,
}

impl ServerConfig {
    pub fn from_attrs(attrs: &Map<String, Value>) -> Result<Self, ChainError> {
        Ok(serde_json::from_value(Value::Object(attrs.clone()))?)
    }
}

impl RelayConfig {
    pub fn from_attrs(attrs: &Map<String, Value>) -> Result<Self, ChainError> {
        Ok(serde_json::from_value(Value::Object(attrs.clone()))?)
    }
}
