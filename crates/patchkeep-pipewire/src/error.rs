//! PipeWire error types.

use patchkeep_core::BackendError;
use thiserror::Error;

/// PipeWire error type.
#[derive(Debug, Error)]
pub enum PwError {
    #[error("PipeWire connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Link creation failed: {0}")]
    LinkCreationFailed(String),

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Link not found: {0} -> {1}")]
    LinkNotFound(String, String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("MainLoop error: {0}")]
    MainLoopError(String),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("PipeWire runtime not running")]
    NotRunning,
}

/// Result type for PipeWire operations.
pub type PwResult<T> = Result<T, PwError>;

impl From<PwError> for BackendError {
    fn from(e: PwError) -> Self {
        match e {
            PwError::ConnectionFailed(msg) | PwError::MainLoopError(msg) => Self::Unavailable(msg),
            PwError::RegistryError(msg) => Self::ActivationFailed(msg),
            PwError::Timeout(what) => Self::ActivationFailed(format!("timed out waiting for {what}")),
            PwError::NotRunning => Self::NotOpen,
            PwError::PortNotFound(name) => Self::PortNotFound(name),
            PwError::LinkNotFound(output, input) => Self::ConnectionNotFound(output, input),
            PwError::LinkCreationFailed(msg) => Self::CallFailed(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_conversion_to_backend_error() {
        assert_matches!(
            BackendError::from(PwError::ConnectionFailed("no socket".to_string())),
            BackendError::Unavailable(msg) if msg == "no socket"
        );
        assert_eq!(BackendError::from(PwError::NotRunning), BackendError::NotOpen);
        assert_matches!(
            BackendError::from(PwError::LinkNotFound("a:out".to_string(), "b:in".to_string())),
            BackendError::ConnectionNotFound(_, _)
        );
    }
}
