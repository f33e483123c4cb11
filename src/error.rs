//! Error types for the volume tracker

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the volume tracker
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Caller errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Token not found: {0}")]
    TokenNotFound(String),

    // Trade source errors
    #[error("Trade fetch failed for {token}: {reason}")]
    TradeFetch { token: String, reason: String },

    #[error("Stream connection failed: {0}")]
    StreamConnection(String),

    #[error("Stream disconnected")]
    StreamDisconnected,

    #[error("Stream decode error: {0}")]
    StreamDecode(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TradeFetch { .. }
                | Error::StreamConnection(_)
                | Error::StreamDisconnected
                | Error::StreamDecode(_)
        )
    }

    /// Check if this error was caused by the caller rather than the system
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::TokenNotFound(_))
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let fetch = Error::TradeFetch {
            token: "mint1".to_string(),
            reason: "timeout".to_string(),
        };
        assert!(fetch.is_retryable());
        assert!(Error::StreamDisconnected.is_retryable());
        assert!(!Error::Config("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_input_error_classification() {
        assert!(Error::InvalidInput("Token address is required".to_string()).is_input_error());
        assert!(Error::TokenNotFound("mint1".to_string()).is_input_error());
        assert!(!Error::Internal("boom".to_string()).is_input_error());
    }

    #[test]
    fn test_display() {
        let err = Error::TradeFetch {
            token: "mint1".to_string(),
            reason: "connection reset".to_string(),
        };
        assert_eq!(err.to_string(), "Trade fetch failed for mint1: connection reset");
    }
}
