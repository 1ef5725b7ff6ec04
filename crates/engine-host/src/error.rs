//! Engine host error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to start engine: {0}")]
    Spawn(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Analysis service has stopped")]
    ServiceStopped,
}

impl From<uci_core::ConfigError> for EngineError {
    fn from(e: uci_core::ConfigError) -> Self {
        EngineError::Config(e.to_string())
    }
}
