//! Error types for the limber_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for limber_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error (catalog source is not well-formed YAML)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog or regimen validation error. The message names the failing path.
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// No regimen claims the given weekday
    #[error("No regimen is assigned to weekday {0}")]
    NotAssigned(u8),

    /// A history entry with the same composite key already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A history entry failed basic shape checks (empty name, zero ordinal)
    #[error("Invalid history entry: {0}")]
    InvalidEntry(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::CatalogValidation(msg.into())
    }
}
