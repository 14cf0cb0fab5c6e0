//! Idempotency-key header extraction.

use axum::http::HeaderMap;
use common::IdempotencyKey;
use uuid::Uuid;

use crate::error::ApiError;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// The header when present; publisher-issued requests always carry one.
pub fn optional_key(headers: &HeaderMap) -> Option<IdempotencyKey> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(IdempotencyKey::new)
}

/// Required header; 400 when missing or empty.
pub fn require_key(headers: &HeaderMap) -> Result<IdempotencyKey, ApiError> {
    optional_key(headers)
        .ok_or_else(|| ApiError::BadRequest("missing idempotency-key header".to_string()))
}

/// Saga initiation keys must be UUIDs (they become the saga log's unique
/// key).
pub fn require_uuid_key(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    let key = require_key(headers)?;
    key.as_uuid()
        .ok_or_else(|| ApiError::BadRequest("idempotency-key must be a UUID".to_string()))
}
