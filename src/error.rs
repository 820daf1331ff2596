//! # Error Types
//!
//! Custom error types for Grid Watch using `thiserror`.

use thiserror::Error;

/// Main error type for Grid Watch
#[derive(Debug, Error)]
pub enum GridWatchError {
    /// Telemetry source unreachable or returned a malformed reading
    #[error("Acquisition error: {0}")]
    Acquisition(String),

    /// State or history file could not be written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Push notification could not be delivered
    #[error("Notification error: {0}")]
    Notification(String),

    /// Audio clip could not be played on the cast device
    #[error("Playback error: {0}")]
    Playback(String),

    /// Configuration file parse errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("Serial port not found (tried: {0})")]
    SerialPortNotFound(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Grid Watch
pub type Result<T> = std::result::Result<T, GridWatchError>;
