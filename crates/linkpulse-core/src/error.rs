use std::time::Duration;

use thiserror::Error;

/// Application-wide error types for linkpulse.
#[derive(Error, Debug)]
pub enum AppError {
    /// Required configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP request failed (store API or provider API).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Request timed out after the configured limit.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// No configured record source could be read.
    #[error("No record source could be read: {0}")]
    SourceUnavailable(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}
