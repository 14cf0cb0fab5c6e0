//! Prometheus exposition endpoint.
//!
//! Renders the saga series recorded by the handlers (`saga_started`,
//! `saga_completed`, `saga_compensated`, `saga_failed`, the per-participant
//! counters like `payments_declined` and `inventory_rejections`) and by the
//! outbox publisher (`outbox_events_published`, `outbox_publish_failures`,
//! `outbox_events_terminally_failed`, `outbox_dispatch_duration_seconds`).
//! Every series carries the `service` label stamped on the recorder at
//! startup, so the four participants can share one scrape config.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics — Prometheus text exposition for this participant.
pub async fn render(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
