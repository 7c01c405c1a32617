use thiserror::Error;

/// Application-wide error types for inmo.
#[derive(Error, Debug)]
pub enum AppError {
    /// An adapter call exceeded its deadline.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The listing or row no longer exists at its source.
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP request failed with a non-success status.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The fetched page did not have the expected structure.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// No site adapter exists for the agency's detected system.
    #[error("Unsupported system: {0}")]
    UnsupportedSystem(String),

    /// The embedded store refused a write because another writer holds the lock.
    #[error("Database is locked: {0}")]
    DatabaseLocked(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Caller-supplied input was rejected.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The operation was aborted by a cancellation signal.
    #[error("Operation cancelled")]
    Cancelled,
}

impl AppError {
    /// Returns true for deadline failures, which earn one escalated retry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AppError::Timeout(_))
    }

    /// Returns true if the store rejected the write due to lock contention.
    pub fn is_contention(&self) -> bool {
        matches!(self, AppError::DatabaseLocked(_))
    }
}
