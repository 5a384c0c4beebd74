use thiserror::Error;

/// Errors building chain or node configuration.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("invalid chain json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server host is missing from chain")]
    MissingServerHost,
}
