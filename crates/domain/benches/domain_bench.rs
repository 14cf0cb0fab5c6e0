use common::{CustomerId, Money, OrderId, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::outbox::DEFAULT_MAX_RETRIES;
use domain::{EventType, OutboxEvent, SagaLog, StepName};
use uuid::Uuid;

fn bench_saga_forward_walk(c: &mut Criterion) {
    c.bench_function("domain/saga_forward_walk", |b| {
        b.iter(|| {
            let mut saga = SagaLog::start(
                Uuid::new_v4(),
                CustomerId::new(),
                ProductId::new("SKU-BENCH"),
                2,
                Money::from_cents(4000),
            );
            for step in StepName::ALL {
                saga.begin_step(step);
                saga.complete_step(step).unwrap();
            }
            saga.transition(domain::SagaStatus::InProgress).unwrap();
            saga.mark_completed().unwrap();
        });
    });
}

fn bench_saga_serialization(c: &mut Criterion) {
    let saga = SagaLog::start(
        Uuid::new_v4(),
        CustomerId::new(),
        ProductId::new("SKU-BENCH"),
        2,
        Money::from_cents(4000),
    );

    c.bench_function("domain/saga_json_roundtrip", |b| {
        b.iter(|| {
            let json = serde_json::to_string(&saga).unwrap();
            let _back: SagaLog = serde_json::from_str(&json).unwrap();
        });
    });
}

fn bench_outbox_event_key(c: &mut Criterion) {
    let event = OutboxEvent::routed(
        OrderId::new(),
        EventType::OrderCreated,
        serde_json::json!({"orderId": "bench"}),
        DEFAULT_MAX_RETRIES,
    )
    .unwrap();

    c.bench_function("domain/outbound_idempotency_key", |b| {
        b.iter(|| event.outbound_idempotency_key());
    });
}

criterion_group!(
    benches,
    bench_saga_forward_walk,
    bench_saga_serialization,
    bench_outbox_event_key
);
criterion_main!(benches);
