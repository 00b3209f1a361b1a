//! Error types for ALMA operations

use thiserror::Error;

/// Persistent store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Range query on {field} failed: {reason}")]
    QueryFailed { field: String, reason: String },

    #[error("Batch commit of {count} documents failed: {reason}")]
    CommitFailed { count: usize, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Document {key} could not be decoded: {reason}")]
    CorruptDocument { key: String, reason: String },

    #[error("Storage backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// External institution source errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Request to {source_name} failed with status {status}: {message}")]
    RequestFailed {
        source_name: String,
        status: u16,
        message: String,
    },

    #[error("Rate limited by {source_name}, retry after {retry_after_ms}ms")]
    RateLimited {
        source_name: String,
        retry_after_ms: u64,
    },

    #[error("Request to {source_name} timed out after {timeout_ms}ms")]
    Timeout { source_name: String, timeout_ms: u64 },

    #[error("Invalid response from {source_name}: {reason}")]
    InvalidResponse { source_name: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all ALMA errors.
#[derive(Debug, Clone, Error)]
pub enum AlmaError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for ALMA operations.
pub type AlmaResult<T> = Result<T, AlmaError>;

/// Build a `SourceError::RequestFailed` wrapped in `AlmaError`.
pub fn request_failed(source_name: &str, status: u16, message: impl Into<String>) -> AlmaError {
    AlmaError::Source(SourceError::RequestFailed {
        source_name: source_name.to_string(),
        status,
        message: message.into(),
    })
}

/// Build a `SourceError::InvalidResponse` wrapped in `AlmaError`.
pub fn invalid_response(source_name: &str, reason: impl Into<String>) -> AlmaError {
    AlmaError::Source(SourceError::InvalidResponse {
        source_name: source_name.to_string(),
        reason: reason.into(),
    })
}

/// Build a `SourceError::RateLimited` wrapped in `AlmaError`.
pub fn rate_limited(source_name: &str, retry_after_ms: u64) -> AlmaError {
    AlmaError::Source(SourceError::RateLimited {
        source_name: source_name.to_string(),
        retry_after_ms,
    })
}

// =============================================================================
// TESTS
// =============================================================================
