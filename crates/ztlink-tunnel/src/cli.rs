//! Command-line entry points: `run` a node, `inspect-cert` a certificate.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use ztlink_config::{
    apply_overrides, load_config, resolve_certificates, validate_config, CliOverrides, LoggingConfig,
};
use ztlink_identity::extract_role;

use crate::context::{HopContext, TunnelOptions};
use crate::listener::listen;
use crate::node::NodeConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "ztlink-run", about = "Run this node in the role its certificate names")]
pub struct RunArgs {
    /// Config file path (json/yaml/toml)
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(flatten)]
    pub overrides: CliOverrides,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "ztlink-inspect-cert", about = "Show the identity attributes of a certificate")]
pub struct InspectArgs {
    /// Certificate PEM file
    #[arg(long)]
    pub cert: PathBuf,
}

/// Load configuration, pick the role from the certificate and serve until
/// SIGINT/SIGTERM.
pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, &args.overrides);
    validate_config(&config)?;

    init_tracing(&config.logging);

    if let Some(listen) = &config.metrics.listen {
        match ztlink_metrics::init_prometheus(listen) {
            Ok(()) => info!("metrics exporter listening on {}", listen),
            Err(e) => warn!("failed to start metrics exporter: {}", e),
        }
    }

    let trust = resolve_certificates(&config.certificate)?;
    let identity = extract_role(&trust.cert_pem)?;
    let node = NodeConfig::from_identity(&identity)?;
    info!(
        role = %identity.role,
        site = identity.site_id.as_deref().unwrap_or("-"),
        cluster = identity.cluster_id.as_deref().unwrap_or("-"),
        "identity loaded"
    );

    let options = TunnelOptions::try_from(&config.tunnel)?;
    let ctx = Arc::new(HopContext::new(trust, options)?);
    let handle = listen(node, ctx).await?;

    let shutdown = handle.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal_handler().await;
        info!("shutdown signal received");
        shutdown.cancel();
    });

    handle.wait().await;
    Ok(())
}

/// Print role and attributes of a certificate.
pub fn inspect(args: InspectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let pem = std::fs::read_to_string(&args.cert)?;
    let identity = extract_role(&pem)?;
    println!("role:    {}", identity.role);
    println!("site:    {}", identity.site_id.as_deref().unwrap_or("-"));
    println!("cluster: {}", identity.cluster_id.as_deref().unwrap_or("-"));
    println!("{}", serde_json::to_string_pretty(&identity.attrs)?);
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Build the filter string from the base level and per-module overrides.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut directives = config.level.as_deref().unwrap_or("info").to_string();
    let mut modules: Vec<_> = config.filters.iter().collect();
    modules.sort();
    for (module, level) in modules {
        directives.push_str(&format!(",{module}={level}"));
    }
    directives
}

/// Install the global subscriber: `format` is json, compact or pretty
/// (default), `output` is stdout or stderr (default).
fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(filter_directives(config)).unwrap_or_else(|_| EnvFilter::new("info"));
    let writer = match config.output.as_deref() {
        Some("stdout") => BoxMakeWriter::new(io::stdout),
        _ => BoxMakeWriter::new(io::stderr),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match config.format.as_deref() {
        Some("json") => registry.with(fmt::layer().json().with_writer(writer)).init(),
        Some("compact") => registry.with(fmt::layer().compact().with_writer(writer)).init(),
        _ => registry.with(fmt::layer().with_writer(writer)).init(),
    }
}
