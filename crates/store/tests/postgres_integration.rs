//! Postgres-backed storage tests.
//!
//! These run only when `DATABASE_URL` points at a disposable database; on a
//! machine without one they skip, so the default suite stays hermetic.

use std::sync::Arc;

use common::{CustomerId, IdempotencyKey, Money, ProductId};
use domain::outbox::DEFAULT_MAX_RETRIES;
use domain::{EventType, Order, OutboxEvent, SagaLog, SagaStatus, StepName};
use sqlx::postgres::PgPoolOptions;
use store::{
    OrderStore, OutboxStore, PostgresStorage, SagaLogStore, StateChange, Storage, StoreError,
};
use uuid::Uuid;

async fn storage() -> Option<Arc<PostgresStorage>> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping Postgres storage test");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("failed to connect to test database");
    let storage = Arc::new(PostgresStorage::new(pool));
    storage.run_migrations().await.expect("migrations failed");
    Some(storage)
}

fn saga() -> SagaLog {
    SagaLog::start(
        Uuid::new_v4(),
        CustomerId::new(),
        ProductId::new(format!("SKU-{}", Uuid::new_v4())),
        2,
        Money::from_cents(4000),
    )
}

#[tokio::test]
async fn commit_and_read_back() {
    let Some(storage) = storage().await else {
        return;
    };

    let mut log = saga();
    log.begin_step(StepName::CreateOrder);
    log.complete_step(StepName::CreateOrder).unwrap();

    let order = Order::create(
        log.saga_id,
        log.customer_id,
        log.product_id.clone(),
        2,
        log.total_price,
        IdempotencyKey::from(log.idempotency_key),
    );
    log.order_id = Some(order.id);

    let event = OutboxEvent::routed(
        order.id,
        EventType::OrderCreated,
        serde_json::json!({"orderId": order.id}),
        DEFAULT_MAX_RETRIES,
    )
    .unwrap();

    storage
        .commit(
            StateChange::new()
                .with_order(order.clone())
                .with_saga(log.clone())
                .with_event(event.clone()),
        )
        .await
        .unwrap();

    // Saga round-trips with its ordered steps intact.
    let loaded = storage.find_saga(log.saga_id).await.unwrap().unwrap();
    assert_eq!(loaded.status, SagaStatus::Started);
    assert_eq!(loaded.order_id, Some(order.id));
    let names: Vec<StepName> = loaded.steps.iter().map(|s| s.name).collect();
    assert_eq!(names, StepName::ALL);

    // Participant row and outbox event landed in the same commit.
    let found = storage
        .find_order_by_idempotency_key(&order.idempotency_key)
        .await
        .unwrap();
    assert_eq!(found.map(|o| o.id), Some(order.id));

    let mut published = event;
    published.mark_published();
    storage.save_publish_state(&published).await.unwrap();
}

#[tokio::test]
async fn duplicate_initiation_key_maps_to_the_typed_error() {
    let Some(storage) = storage().await else {
        return;
    };

    let first = saga();
    storage.save_saga(&first).await.unwrap();

    let mut dup = saga();
    dup.idempotency_key = first.idempotency_key;
    let err = storage.save_saga(&dup).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateIdempotencyKey));

    // The original is still the one the key resolves to.
    let resolved = storage
        .find_saga_by_idempotency_key(first.idempotency_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.saga_id, first.saga_id);
}

#[tokio::test]
async fn unpublished_scan_excludes_exhausted_events() {
    let Some(storage) = storage().await else {
        return;
    };

    let order = Order::create(
        saga().saga_id,
        CustomerId::new(),
        ProductId::new(format!("SKU-{}", Uuid::new_v4())),
        1,
        Money::from_cents(1000),
        IdempotencyKey::new(Uuid::new_v4().to_string()),
    );
    let mut event = OutboxEvent::routed(
        order.id,
        EventType::OrderCreated,
        serde_json::json!({}),
        DEFAULT_MAX_RETRIES,
    )
    .unwrap();
    storage
        .commit(StateChange::new().with_event(event.clone()))
        .await
        .unwrap();

    for _ in 0..DEFAULT_MAX_RETRIES {
        event.record_failure("target unreachable");
        storage.save_publish_state(&event).await.unwrap();
    }

    let pending = storage.find_unpublished(1000).await.unwrap();
    assert!(pending.iter().all(|e| e.id != event.id));
}
