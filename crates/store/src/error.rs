//! Storage error types.

use domain::DomainError;
use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique violation on an idempotency key: the write raced a duplicate
    /// of itself. Callers reload and return the original result.
    #[error("Duplicate idempotency key")]
    DuplicateIdempotencyKey,

    /// Underlying database failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored JSON column failed to (de)serialize.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored literal no longer matches the domain's closed enums.
    #[error("Corrupt row: {0}")]
    Corrupt(#[from] DomainError),

    /// Database migration failure.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Convenience alias for storage results.
pub type Result<T> = std::result::Result<T, StoreError>;
