//! Error types for the sankey flow service
//!
//! Fetch-level failures (`StoreError`, `CacheError`) are isolated per query by
//! the fetcher and never abort a request. `SankeyError` is the request-level
//! taxonomy that the HTTP layer turns into a 400 response.

use std::time::Duration;

use thiserror::Error;

/// Request-level failure. Aborts the whole request.
#[derive(Error, Debug)]
pub enum SankeyError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Flow data could not be fetched within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Inconsistent flow data: {0}")]
    Inconsistent(String),
}

/// Failure executing a query against the analytic store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Analytic store error: {0}")]
    Backend(String),
}

/// Failure talking to the cache store.
#[derive(Error, Debug)]
pub enum CacheError {
    #[cfg(feature = "database")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache error: {0}")]
    Backend(String),
}

/// A query that exhausted its retry budget. Its rows are left out of the
/// diagram; sibling queries are unaffected.
#[derive(Error, Debug, Clone)]
#[error("Query unavailable after {attempts} attempt(s): {last_error}")]
pub struct Unavailable {
    pub query: String,
    pub attempts: u32,
    pub last_error: String,
}

/// Invalid or missing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read palette file {path}: {source}")]
    PaletteIo {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse palette file {path}: {source}")]
    PaletteParse {
        path: String,
        source: serde_yaml::Error,
    },
}

pub type Result<T> = std::result::Result<T, SankeyError>;
