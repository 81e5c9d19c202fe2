//! # Error Types
//!
//! Custom error types for RF Gateway using `thiserror`.

use thiserror::Error;

/// Main error type for RF Gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No registered codec carries the requested protocol name
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    /// Request could not be split into protocol, path and payload
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A request field is missing or out of range for the protocol
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    /// JSON request body errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Shorthand for an [`GatewayError::InvalidField`] error
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias for RF Gateway
pub type Result<T> = std::result::Result<T, GatewayError>;
