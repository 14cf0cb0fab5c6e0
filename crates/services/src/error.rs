//! Participant service errors.
//!
//! Business-level outcomes ("SagaLog not found", a declined payment) are NOT
//! errors: they travel as `success:false` envelopes. This type covers only
//! infrastructure failures that abort the current request.

use domain::DomainError;
use store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
