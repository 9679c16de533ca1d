//! Store error types.

use thiserror::Error;

/// Errors that can occur during order store operations.
///
/// Persistence failures are non-fatal to callers: the ingest path and
/// the reconciler log and retry at their own level, the store itself
/// never retries.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored status value no longer parses.
    #[error("unrecognized order status in storage: {0}")]
    InvalidStatus(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
