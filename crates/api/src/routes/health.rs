//! Liveness endpoint.
//!
//! `"ok"` means this participant process is accepting requests. It makes no
//! claim about the database or the peer services: the saga tolerates peers
//! being down, because undelivered outbox events simply wait for the
//! publisher's next cycle.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Which participant role this process runs as (order, payment,
    /// inventory, or shipping).
    pub service: &'static str,
}

/// GET /health — liveness of this participant.
pub async fn check(State(service): State<&'static str>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service,
    })
}
