//! Everything a hop needs at runtime, built once at startup.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use ztlink_config::TunnelConfig;
use ztlink_core::defaults::{
    DEFAULT_CONNECTION_BACKLOG, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_HEADER_BYTES,
    DEFAULT_RELAY_BUFFER_SIZE, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
use ztlink_identity::{PeerVerifier, TrustMaterial};
use ztlink_transport::{TlsTransportAcceptor, TlsTransportConnector};

use crate::error::TunnelError;
use crate::telemetry::{Event, EventSink, LogEventSink, MetricsSink, PrometheusMetrics};

/// Tunables shared by all connections of a listener.
#[derive(Debug, Clone)]
pub struct TunnelOptions {
    pub listen_host: IpAddr,
    pub relay_buffer_size: usize,
    pub connect_timeout: Duration,
    /// `None` waits for the readiness token indefinitely.
    pub readiness_timeout: Option<Duration>,
    pub shutdown_timeout: Duration,
    pub connection_backlog: u32,
    pub max_header_bytes: usize,
}

impl Default for TunnelOptions {
    fn default() -> Self {
        Self {
            listen_host: IpAddr::from([0, 0, 0, 0]),
            relay_buffer_size: DEFAULT_RELAY_BUFFER_SIZE,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            readiness_timeout: None,
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            connection_backlog: DEFAULT_CONNECTION_BACKLOG,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
        }
    }
}

impl TryFrom<&TunnelConfig> for TunnelOptions {
    type Error = TunnelError;

    fn try_from(cfg: &TunnelConfig) -> Result<Self, Self::Error> {
        let listen_host = cfg
            .listen_host
            .parse()
            .map_err(|_| TunnelError::Config(format!("invalid listen_host {:?}", cfg.listen_host)))?;
        Ok(Self {
            listen_host,
            relay_buffer_size: cfg.relay_buffer_size,
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            readiness_timeout: cfg.readiness_timeout_secs.map(Duration::from_secs),
            shutdown_timeout: Duration::from_secs(cfg.shutdown_timeout_secs),
            connection_backlog: cfg.connection_backlog,
            max_header_bytes: cfg.max_header_bytes,
        })
    }
}

/// Trust material, TLS endpoints, sinks and options of one node.
pub struct HopContext {
    pub trust: TrustMaterial,
    pub verifier: PeerVerifier,
    /// Present when the node has a private key.
    pub acceptor: Option<TlsTransportAcceptor>,
    pub connector: TlsTransportConnector,
    pub events: Arc<dyn EventSink>,
    pub metrics: Arc<dyn MetricsSink>,
    pub options: TunnelOptions,
}

impl HopContext {
    pub fn new(trust: TrustMaterial, options: TunnelOptions) -> Result<Self, TunnelError> {
        let verifier =
            PeerVerifier::new(&trust.ca_pem).map_err(|e| TunnelError::CertParse(format!("trust root: {e}")))?;
        let connector = TlsTransportConnector::new(verifier.roots())?;
        let acceptor = match &trust.key_pem {
            Some(key) => Some(TlsTransportAcceptor::from_pem(&trust.cert_pem, key)?),
            None => None,
        };
        Ok(Self {
            trust,
            verifier,
            acceptor,
            connector,
            events: Arc::new(LogEventSink),
            metrics: Arc::new(PrometheusMetrics),
            options,
        })
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub(crate) fn emit(&self, event: Event) {
        self.events.emit(&event);
    }
}

impl std::fmt::Debug for HopContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HopContext")
            .field("trust", &self.trust)
            .field("terminates_tls", &self.acceptor.is_some())
            .field("options", &self.options)
            .finish()
    }
}
