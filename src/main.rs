//! Unified ztlink CLI.
//!
//! - `ztlink run` - Run this node as client, relay or server (taken from its certificate)
//! - `ztlink inspect-cert` - Show the identity attributes embedded in a certificate

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// ztlink unified CLI.
#[derive(Parser)]
#[command(
    name = "ztlink",
    version,
    about = "Zero-trust TCP overlay over chained, mutually verified TLS hops",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node.
    #[command(name = "run", alias = "serve")]
    Run(Box<ztlink_tunnel::cli::RunArgs>),

    /// Print role and attributes of a certificate.
    #[command(name = "inspect-cert")]
    InspectCert(ztlink_tunnel::cli::InspectArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => ztlink_tunnel::cli::run(*args).await,
        Commands::InspectCert(args) => ztlink_tunnel::cli::inspect(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
