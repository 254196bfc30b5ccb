use eqsweep::core::design::DesignError;
use eqsweep::core::io::IoError;
use eqsweep::engine::config::ConfigError;
use eqsweep::engine::error::EngineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Design(#[from] DesignError),

    #[error(transparent)]
    Artifact(#[from] IoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
