//! Error types for chain reads and aggregation

use thiserror::Error;

/// A single external read failed.
///
/// Scoped to one activity source or one proposal id; the next scheduled
/// tick is the retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadError {
    /// Provider returned an error
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Read did not complete in time
    #[error("Read timed out")]
    Timeout,

    /// Provider or contract does not support the requested log filter
    #[error("Unsupported log filter: {0}")]
    UnsupportedFilter(String),

    /// Returned value did not have the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Provider connection is not available
    #[error("Provider unavailable")]
    Unavailable,
}

/// A required contract address is not configured.
///
/// The affected source or module is treated as permanently empty.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Missing contract address: {0}")]
    MissingAddress(&'static str),

    #[error("No normalizer registered for {0}")]
    MissingNormalizer(&'static str),
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Chain fixture is not valid JSON
    #[error("Fixture parse error: {0}")]
    Fixture(#[from] serde_json::Error),
}

/// Result type for aggregation operations
pub type Result<T> = std::result::Result<T, Error>;
