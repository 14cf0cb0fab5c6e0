//! Integration tests for the HTTP surface.
//!
//! All four service routers share one in-memory store; a drain helper plays
//! the outbox publisher by re-posting each pending event to the right
//! router with the computed `idempotency-key` header.

use std::sync::{Arc, OnceLock};

use api::config::ServiceKind;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{DEFAULT_INITIAL_STOCK, TargetService};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use services::{
    FixedGateway, InventoryHandler, OrderHandler, PaymentHandler, ProtocolConfig, ShippingHandler,
};
use store::{InMemoryStorage, OutboxStore, SagaLogStore, ShipmentStore};
use tower::ServiceExt;
use uuid::Uuid;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct Apps {
    order: Router,
    payment: Router,
    inventory: Router,
    shipping: Router,
}

impl Apps {
    fn for_target(&self, target: TargetService) -> &Router {
        match target {
            TargetService::Order => &self.order,
            TargetService::Payment => &self.payment,
            TargetService::Inventory => &self.inventory,
            TargetService::Shipping => &self.shipping,
        }
    }
}

fn setup() -> (Apps, Arc<InMemoryStorage>, FixedGateway) {
    let store = Arc::new(InMemoryStorage::new());
    let config = ProtocolConfig::default();
    let gateway = FixedGateway::approving();

    let apps = Apps {
        order: api::create_app(
            ServiceKind::Order,
            api::order_router(OrderHandler::new(store.clone(), config)),
            metrics_handle(),
        ),
        payment: api::create_app(
            ServiceKind::Payment,
            api::payment_router(PaymentHandler::new(store.clone(), gateway.clone(), config)),
            metrics_handle(),
        ),
        inventory: api::create_app(
            ServiceKind::Inventory,
            api::inventory_router(InventoryHandler::new(store.clone(), config)),
            metrics_handle(),
        ),
        shipping: api::create_app(
            ServiceKind::Shipping,
            api::shipping_router(ShippingHandler::new(store.clone())),
            metrics_handle(),
        ),
    };

    (apps, store, gateway)
}

async fn send(
    app: &Router,
    method: &str,
    path: &str,
    key: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(key) = key {
        builder = builder.header("idempotency-key", key);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Plays the publisher: posts every pending event to its target router.
async fn drain(apps: &Apps, store: &InMemoryStorage) {
    for _ in 0..32 {
        let events = store.find_unpublished(10).await.unwrap();
        if events.is_empty() {
            return;
        }
        for mut event in events {
            let app = apps.for_target(event.target_service);
            let path = format!("/api/v1{}", event.target_endpoint);
            let key = event.outbound_idempotency_key();
            let (status, body) = send(
                app,
                "POST",
                &path,
                Some(key.as_str()),
                Some(event.payload.clone()),
            )
            .await;
            if status.is_success() && body != Value::Null {
                event.mark_published();
            } else {
                event.record_failure(format!("HTTP {status}"));
            }
            store.save_publish_state(&event).await.unwrap();
        }
    }
    panic!("outbox did not drain");
}

fn start_body() -> Value {
    json!({
        "customerId": Uuid::new_v4(),
        "productId": "SKU-001",
        "quantity": 2,
        "totalPrice": 4000
    })
}

#[tokio::test]
async fn health_reports_the_participant_role() {
    let (apps, _, _) = setup();

    let (status, body) = send(&apps.order, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "order");

    let (_, body) = send(&apps.shipping, "GET", "/health", None, None).await;
    assert_eq!(body["service"], "shipping");
}

#[tokio::test]
async fn start_requires_an_idempotency_key_header() {
    let (apps, _, _) = setup();
    let (status, body) = send(
        &apps.order,
        "POST",
        "/api/v1/order/start",
        None,
        Some(start_body()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn start_rejects_a_non_uuid_key() {
    let (apps, _, _) = setup();
    let (status, _) = send(
        &apps.order,
        "POST",
        "/api/v1/order/start",
        Some("not-a-uuid"),
        Some(start_body()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn happy_path_over_http() {
    let (apps, store, _) = setup();
    let key = Uuid::new_v4().to_string();

    let (status, body) = send(
        &apps.order,
        "POST",
        "/api/v1/order/start",
        Some(&key),
        Some(start_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let order_id = body["data"]["orderId"].as_str().unwrap().to_string();
    let saga_id = body["data"]["sagaLogId"].as_str().unwrap().to_string();

    drain(&apps, &store).await;

    // Order remains CONFIRMED.
    let (status, body) = send(
        &apps.order,
        "GET",
        &format!("/api/v1/order/{order_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "CONFIRMED");

    // Saga is terminal-COMPLETED.
    let saga = store
        .find_saga(saga_id.parse::<Uuid>().unwrap().into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saga.status, domain::SagaStatus::Completed);

    // Inventory reserved the requested units.
    let (_, body) = send(&apps.inventory, "GET", "/api/v1/inventory/SKU-001", None, None).await;
    assert_eq!(
        body["data"]["quantity"].as_u64().unwrap(),
        (DEFAULT_INITIAL_STOCK - 2) as u64
    );
    assert_eq!(body["data"]["reservedQuantity"].as_u64().unwrap(), 2);

    // Shipment exists and reads back as SHIPPED.
    let shipment = store
        .find_shipment_by_saga(saga.saga_id)
        .await
        .unwrap()
        .unwrap();
    let (_, body) = send(
        &apps.shipping,
        "GET",
        &format!("/api/v1/shipping/{}", shipment.id),
        None,
        None,
    )
    .await;
    assert_eq!(body["data"]["status"], "SHIPPED");
}

#[tokio::test]
async fn duplicate_start_returns_an_identical_envelope() {
    let (apps, store, _) = setup();
    let key = Uuid::new_v4().to_string();
    let body = start_body();

    let (_, first) = send(
        &apps.order,
        "POST",
        "/api/v1/order/start",
        Some(&key),
        Some(body.clone()),
    )
    .await;
    let (_, second) = send(
        &apps.order,
        "POST",
        "/api/v1/order/start",
        Some(&key),
        Some(body),
    )
    .await;

    assert_eq!(first, second);
    assert_eq!(store.saga_count().await, 1);
}

#[tokio::test]
async fn payment_decline_compensates_over_http() {
    let (apps, store, gateway) = setup();
    gateway.set_decline(true);

    let key = Uuid::new_v4().to_string();
    let (_, body) = send(
        &apps.order,
        "POST",
        "/api/v1/order/start",
        Some(&key),
        Some(start_body()),
    )
    .await;
    let order_id = body["data"]["orderId"].as_str().unwrap().to_string();
    let saga_id: Uuid = body["data"]["sagaLogId"].as_str().unwrap().parse().unwrap();

    drain(&apps, &store).await;

    let (_, body) = send(
        &apps.order,
        "GET",
        &format!("/api/v1/order/{order_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(body["data"]["status"], "COMPENSATED");

    let saga = store.find_saga(saga_id.into()).await.unwrap().unwrap();
    assert_eq!(saga.status, domain::SagaStatus::Compensated);
}

#[tokio::test]
async fn reads_reply_with_a_soft_failure_for_unknown_ids() {
    let (apps, _, _) = setup();
    let (status, body) = send(
        &apps.order,
        "GET",
        &format!("/api/v1/order/{}", Uuid::new_v4()),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Order not found");
}

#[tokio::test]
async fn inventory_initialize_and_get() {
    let (apps, _, _) = setup();

    let (status, body) = send(
        &apps.inventory,
        "POST",
        "/api/v1/inventory/initialize",
        None,
        Some(json!({"productId": "SKU-42", "quantity": 7})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, body) = send(&apps.inventory, "GET", "/api/v1/inventory/SKU-42", None, None).await;
    assert_eq!(body["data"]["quantity"].as_u64().unwrap(), 7);
}

#[tokio::test]
async fn metrics_endpoint_renders() {
    let (apps, _, _) = setup();
    let (status, _) = send(&apps.order, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
