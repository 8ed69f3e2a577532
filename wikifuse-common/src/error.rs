//! Common error types for wikifuse

use thiserror::Error;

/// Common result type for wikifuse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the wikifuse crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML document could not be parsed into the requested type
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
