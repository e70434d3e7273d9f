//! Error types for the Chainlake core.
//!
//! Variants follow the operational taxonomy: transient I/O is retried,
//! validation drops the single offending record, consistency is surfaced
//! through partition status, and configuration errors halt the affected
//! record because silent misclassification would corrupt aggregates.

use thiserror::Error;

/// Chainlake operation errors
#[derive(Error, Debug)]
pub enum ChainlakeError {
    /// Transient I/O failure (node unreachable, store timeout); retryable
    #[error("Transient error: {0}")]
    Transient(String),

    /// Malformed record; dropped individually, batch continues
    #[error("Validation error: {0}")]
    Validation(String),

    /// Detected inconsistency (hole in a partition, misaligned bucket)
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Fatal configuration problem (unknown asset decimals, bad thresholds)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store-level error
    #[error("Store error: {0}")]
    Store(String),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChainlakeError {
    /// Whether the fetcher should retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainlakeError::Transient(_))
    }
}

impl From<serde_json::Error> for ChainlakeError {
    fn from(err: serde_json::Error) -> Self {
        ChainlakeError::Validation(err.to_string())
    }
}

impl From<anyhow::Error> for ChainlakeError {
    fn from(err: anyhow::Error) -> Self {
        ChainlakeError::Internal(err.to_string())
    }
}

impl From<std::env::VarError> for ChainlakeError {
    fn from(err: std::env::VarError) -> Self {
        ChainlakeError::Config(err.to_string())
    }
}

/// Convenience result alias used across the workspace
pub type Result<T> = std::result::Result<T, ChainlakeError>;
