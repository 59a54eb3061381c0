//! Error types for the Baton relay supervisor
//!
//! This module provides comprehensive error handling using thiserror for
//! structured error definitions and anyhow for error propagation.

use thiserror::Error;

/// Main error type for Baton operations
#[derive(Error, Debug)]
pub enum BatonError {
    /// Agent process or terminal surface could not be created
    #[error("Transport start failure: {0}")]
    TransportStart(String),

    /// Claude binary could not be located
    #[error("Claude binary not found: {0}")]
    ClaudeNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Hook installation failed
    #[error("Install error: {0}")]
    Install(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Baton operations
pub type Result<T> = std::result::Result<T, BatonError>;

/// Convert anyhow::Error to BatonError
impl From<anyhow::Error> for BatonError {
    fn from(err: anyhow::Error) -> Self {
        BatonError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BatonError::TransportStart("tmux new-session failed".to_string());
        assert_eq!(
            err.to_string(),
            "Transport start failure: tmux new-session failed"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: BatonError = io_err.into();
        assert!(matches!(err, BatonError::Io(_)));
    }
}
