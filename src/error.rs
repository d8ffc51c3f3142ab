// src/error.rs

//! Unified error handling for the watcher application.

use std::fmt;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Ledger store could not be opened (permissions, missing directory)
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Ledger read failed (consumed fail-open inside the ledger)
    #[error("storage read error: {0}")]
    StorageRead(String),

    /// Ledger write failed
    #[error("storage write error: {0}")]
    StorageWrite(String),

    /// Webhook delivery failed (transport error or non-2xx response)
    #[error("delivery to {endpoint} failed: {reason}")]
    Delivery { endpoint: String, reason: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage-unavailable error.
    pub fn storage_unavailable(message: impl fmt::Display) -> Self {
        Self::StorageUnavailable(message.to_string())
    }

    /// Create a storage read error.
    pub fn storage_read(message: impl fmt::Display) -> Self {
        Self::StorageRead(message.to_string())
    }

    /// Create a storage write error.
    pub fn storage_write(message: impl fmt::Display) -> Self {
        Self::StorageWrite(message.to_string())
    }

    /// Create a delivery error with the target endpoint.
    pub fn delivery(endpoint: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Delivery {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }
}
