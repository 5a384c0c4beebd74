//! Configuration loading, validation and CLI overrides.
//!
//! The file holds only process-level settings. Everything describing the
//! node's place in the overlay (role, chain, allowlist) comes from its
//! certificate instead.

mod certificate;
mod cli;
mod defaults;
mod loader;
mod types;
mod validate;

pub use certificate::{resolve_certificates, resolve_certificates_with, CA_PEM_ENV, CERT_PEM_ENV, KEY_PEM_ENV};
pub use cli::{apply_overrides, CliOverrides};
pub use loader::{load_config, ConfigError};
pub use types::*;
pub use validate::validate_config;
