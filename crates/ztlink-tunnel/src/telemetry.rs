//! Operational events and handshake metrics.
//!
//! Handlers report through two small traits so the sinks can be swapped
//! (tests record, production logs JSON and exports Prometheus metrics).

use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info};
use ztlink_chain::{ChainDescriptor, RelayConfig, ServerConfig};
use ztlink_core::io::ForwardMetrics;
use ztlink_identity::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventTag {
    #[serde(rename = "Connect success")]
    ConnectSuccess,
    #[serde(rename = "Connect fail")]
    ConnectFail,
    #[serde(rename = "Client tls invalid")]
    ClientTlsFail,
    #[serde(rename = "Server tls invalid")]
    ServerTlsFail,
    #[serde(rename = "Resource not found")]
    ResourceNotFound,
}

impl EventTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventTag::ConnectSuccess => "Connect success",
            EventTag::ConnectFail => "Connect fail",
            EventTag::ClientTlsFail => "Client tls invalid",
            EventTag::ServerTlsFail => "Server tls invalid",
            EventTag::ResourceNotFound => "Resource not found",
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, EventTag::ConnectSuccess)
    }
}

/// One operational event, serialized as JSON by [`LogEventSink`].
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub operator: Role,
    pub client_info: Option<ChainDescriptor>,
    pub server_info: Option<ServerConfig>,
    pub relay_info: Option<RelayConfig>,
    pub tag: EventTag,
    pub msg_info: String,
}

/// Which node is reporting, with the static config it reports alongside.
#[derive(Debug, Clone, Copy)]
pub enum EventOrigin<'a> {
    Client,
    Relay(&'a RelayConfig),
    Server(&'a ServerConfig),
}

impl EventOrigin<'_> {
    pub fn role(&self) -> Role {
        match self {
            EventOrigin::Client => Role::Client,
            EventOrigin::Relay(_) => Role::Relay,
            EventOrigin::Server(_) => Role::Server,
        }
    }

    pub fn event(
        &self,
        chain: Option<&ChainDescriptor>,
        tag: EventTag,
        msg_info: impl Into<String>,
    ) -> Event {
        Event {
            operator: self.role(),
            client_info: chain.cloned(),
            server_info: match self {
                EventOrigin::Server(cfg) => Some((*cfg).clone()),
                _ => None,
            },
            relay_info: match self {
                EventOrigin::Relay(cfg) => Some((*cfg).clone()),
                _ => None,
            },
            tag,
            msg_info: msg_info.into(),
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// Logs each event as one JSON document; failures at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: &Event) {
        ztlink_metrics::record_event(event.tag.as_str());
        let doc = match serde_json::to_string(event) {
            Ok(doc) => doc,
            Err(e) => format!("{{\"tag\":\"{}\",\"encode_error\":\"{e}\"}}", event.tag.as_str()),
        };
        if event.tag.is_failure() {
            error!(target: "ztlink::events", operator = %event.operator, tag = event.tag.as_str(), "{doc}");
        } else {
            info!(target: "ztlink::events", operator = %event.operator, tag = event.tag.as_str(), "{doc}");
        }
    }
}

/// Keeps events in memory, for tests and embedders that ship them elsewhere.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<Event>>,
}

impl MemoryEventSink {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn tags(&self) -> Vec<EventTag> {
        self.events.lock().iter().map(|e| e.tag).collect()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: &Event) {
        self.events.lock().push(event.clone());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Fail,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Fail => "fail",
        }
    }
}

pub trait MetricsSink: Send + Sync {
    /// Record how long a hop took to reach forwarding (or fail).
    fn record_delay(&self, operator: Role, outcome: Outcome, elapsed: Duration, id: &str, name: &str);
}

/// Records into the process-wide `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusMetrics;

impl MetricsSink for PrometheusMetrics {
    fn record_delay(&self, operator: Role, outcome: Outcome, elapsed: Duration, id: &str, name: &str) {
        ztlink_metrics::record_handshake(
            operator.as_str(),
            outcome.as_str(),
            id,
            name,
            elapsed.as_secs_f64(),
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelaySample {
    pub operator: Role,
    pub outcome: Outcome,
    pub id: String,
    pub name: String,
}

/// Keeps delay samples in memory (durations are dropped).
#[derive(Debug, Default)]
pub struct MemoryMetrics {
    samples: Mutex<Vec<DelaySample>>,
}

impl MemoryMetrics {
    pub fn samples(&self) -> Vec<DelaySample> {
        self.samples.lock().clone()
    }
}

impl MetricsSink for MemoryMetrics {
    fn record_delay(&self, operator: Role, outcome: Outcome, _elapsed: Duration, id: &str, name: &str) {
        self.samples.lock().push(DelaySample {
            operator,
            outcome,
            id: id.to_string(),
            name: name.to_string(),
        });
    }
}

/// Byte counters for the forwarding stage.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ForwardedBytes;

impl ForwardMetrics for ForwardedBytes {
    #[inline]
    fn record_upstream(&self, bytes: u64) {
        ztlink_metrics::record_bytes_forwarded("upstream", bytes);
    }
    #[inline]
    fn record_downstream(&self, bytes: u64) {
        ztlink_metrics::record_bytes_forwarded("downstream", bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_json_shape() {
        let relay = RelayConfig {
            uuid: "r-1".into(),
            ..Default::default()
        };
        let event = EventOrigin::Relay(&relay).event(None, EventTag::ServerTlsFail, "bad cert");
        let doc: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(doc["operator"], "relay");
        assert_eq!(doc["tag"], "Server tls invalid");
        assert_eq!(doc["msg_info"], "bad cert");
        assert_eq!(doc["relay_info"]["uuid"], "r-1");
        assert!(doc["server_info"].is_null());
        assert!(doc["client_info"].is_null());
    }

    #[test]
    fn server_events_carry_server_info() {
        let server = ServerConfig {
            uuid: "s-1".into(),
            ..Default::default()
        };
        let chain = ChainDescriptor {
            uuid: "c-1".into(),
            ..Default::default()
        };
        let event =
            EventOrigin::Server(&server).event(Some(&chain), EventTag::ConnectSuccess, "");
        assert_eq!(event.operator, Role::Server);
        assert_eq!(event.server_info.unwrap().uuid, "s-1");
        assert_eq!(event.client_info.unwrap().uuid, "c-1");
    }

    #[test]
    fn only_success_is_not_a_failure() {
        assert!(!EventTag::ConnectSuccess.is_failure());
        for tag in [
            EventTag::ConnectFail,
            EventTag::ClientTlsFail,
            EventTag::ServerTlsFail,
            EventTag::ResourceNotFound,
        ] {
            assert!(tag.is_failure());
        }
    }
}
