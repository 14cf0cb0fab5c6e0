//! API error types with HTTP response mapping.
//!
//! Business outcomes never come through here: handlers return them as
//! `success:false` envelopes at 200. This type maps validation failures to
//! 400 and infrastructure failures to 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use services::ServiceError;

#[derive(Debug)]
pub enum ApiError {
    /// Malformed request (missing/invalid idempotency key, bad path param).
    BadRequest(String),
    /// Storage or serialization failure inside a handler.
    Service(ServiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Service(err) => {
                tracing::error!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        let body = serde_json::json!({ "success": false, "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}
