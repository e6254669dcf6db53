//! Error types for Kairos gateway

use thiserror::Error;

/// Result type alias for Kairos operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Kairos gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Upstream ASR, NLU or music-ID failure; no intent was formed
    #[error("recognition failed: {0}")]
    Recognition(String),

    /// Intent is malformed (bad confidence, missing parameters)
    #[error("invalid intent: {0}")]
    InvalidIntent(String),

    /// Request payload failed validation
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Too many confirmations are already waiting on the operator
    #[error("pending confirmation capacity exceeded (max {max})")]
    CapacityExceeded { max: usize },

    /// Unknown or already-resolved confirmation id
    #[error("not found: {0}")]
    NotFound(String),

    /// Presentation backend rejected the command or retries were exhausted
    #[error("backend failure: {0}")]
    BackendFailure(String),

    /// Backend call exceeded its deadline or went unanswered; true outcome unknown
    #[error("backend timeout: {0}")]
    Timeout(String),

    /// Execution concurrency limit reached
    #[error("execution gateway overloaded")]
    Overloaded,

    /// Adapter not configured
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
