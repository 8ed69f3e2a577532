//! Error types for wikifuse-engine
//!
//! Data-quality problems in scraped records are never errors; only caller
//! misconfiguration is.

use thiserror::Error;

/// Fusion engine error type
#[derive(Debug, Error)]
pub enum FusionError {
    /// Duplicate detection algorithm name not recognized
    #[error("Unknown algorithm: {0} (expected exact, fuzzy, hybrid or advanced)")]
    UnknownAlgorithm(String),

    /// Configuration value out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Exclusion pattern failed to compile
    #[error("Invalid exclusion pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// wikifuse-common error
    #[error("Common error: {0}")]
    Common(#[from] wikifuse_common::Error),
}

/// Result type for engine operations
pub type FusionResult<T> = Result<T, FusionError>;
