//! Error types for the CLI.

use tally_core::{ConfigError, TallyError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tally(#[from] TallyError),
    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to initialize logging: {0}")]
    Telemetry(String),
}

pub type CliResult<T> = Result<T, CliError>;
