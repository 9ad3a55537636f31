//! Error types for Patchkeep core.

use thiserror::Error;

/// Core error type for graph-model operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed port name (expected \"client:port\"): {0}")]
    MalformedPortName(String),

    #[error("Unsupported port type: {0}")]
    UnsupportedPortType(String),

    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Invalid client: {0}")]
    InvalidClient(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid port pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Result type alias for Patchkeep core operations.
pub type Result<T> = std::result::Result<T, Error>;
