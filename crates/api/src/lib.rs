//! HTTP surface for the saga participant services.
//!
//! One binary serves any of the four roles; every role exposes its spec'd
//! endpoints under `/api/v1` plus `/health` and `/metrics`, with tracing and
//! CORS layers applied uniformly.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use services::{
    InventoryHandler, OrderHandler, PaymentGateway, PaymentHandler, ProtocolConfig,
    ShippingHandler, SimulatedGateway,
};
use store::Storage;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::ServiceKind;

/// Order service routes (below `/api/v1`).
pub fn order_router<S: Storage + Clone>(handler: OrderHandler<S>) -> Router {
    Router::new()
        .route("/order/start", post(routes::order::start::<S>))
        .route("/order/compensate", post(routes::order::compensate::<S>))
        .route("/order/{order_id}", get(routes::order::get::<S>))
        .with_state(handler)
}

/// Payment service routes (below `/api/v1`).
pub fn payment_router<S, G>(handler: PaymentHandler<S, G>) -> Router
where
    S: Storage + Clone,
    G: PaymentGateway + Clone + 'static,
{
    Router::new()
        .route("/payment/process", post(routes::payment::process::<S, G>))
        .route("/payment/refund", post(routes::payment::refund::<S, G>))
        .route("/payment/{payment_id}", get(routes::payment::get::<S, G>))
        .with_state(handler)
}

/// Inventory service routes (below `/api/v1`).
pub fn inventory_router<S: Storage + Clone>(handler: InventoryHandler<S>) -> Router {
    Router::new()
        .route("/inventory/update", post(routes::inventory::update::<S>))
        .route(
            "/inventory/compensate",
            post(routes::inventory::compensate::<S>),
        )
        .route(
            "/inventory/initialize",
            post(routes::inventory::initialize::<S>),
        )
        .route("/inventory/{product_id}", get(routes::inventory::get::<S>))
        .with_state(handler)
}

/// Shipping service routes (below `/api/v1`).
pub fn shipping_router<S: Storage + Clone>(handler: ShippingHandler<S>) -> Router {
    Router::new()
        .route("/shipping/deliver", post(routes::shipping::deliver::<S>))
        .route("/shipping/cancel", post(routes::shipping::cancel::<S>))
        .route("/shipping/{shipping_id}", get(routes::shipping::get::<S>))
        .with_state(handler)
}

/// Builds the role-specific API router. Payment uses the simulated gateway
/// with the configured failure rate.
pub fn service_router<S: Storage + Clone>(
    kind: ServiceKind,
    store: Arc<S>,
    protocol: ProtocolConfig,
) -> Router {
    match kind {
        ServiceKind::Order => order_router(OrderHandler::new(store, protocol)),
        ServiceKind::Payment => payment_router(PaymentHandler::new(
            store,
            SimulatedGateway::new(protocol.payment_failure_rate),
            protocol,
        )),
        ServiceKind::Inventory => inventory_router(InventoryHandler::new(store, protocol)),
        ServiceKind::Shipping => shipping_router(ShippingHandler::new(store)),
    }
}

/// Wraps a role's API router with the shared surface: `/api/v1` prefix,
/// role-aware health, metrics, CORS, and request tracing.
pub fn create_app(kind: ServiceKind, api: Router, metrics_handle: PrometheusHandle) -> Router {
    let health_router = Router::new()
        .route("/health", get(routes::health::check))
        .with_state(kind.as_str());
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .nest("/api/v1", api)
        .merge(health_router)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
