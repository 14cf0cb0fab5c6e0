//! Storage trait seams.

use async_trait::async_trait;
use common::{IdempotencyKey, OrderId, PaymentId, ProductId, SagaId, ShipmentId};
use domain::{InventoryLevel, Order, OutboxEvent, Payment, SagaLog, Shipment};
use uuid::Uuid;

use crate::change::StateChange;
use crate::error::Result;

/// Access to the saga log (C1).
#[async_trait]
pub trait SagaLogStore: Send + Sync {
    /// Dedupe anchor for saga initiation.
    async fn find_saga_by_idempotency_key(&self, key: Uuid) -> Result<Option<SagaLog>>;

    /// Loads a saga for step mutation.
    async fn find_saga(&self, saga_id: SagaId) -> Result<Option<SagaLog>>;

    /// Standalone upsert keyed by `saga_id`. Most writers go through
    /// [`Storage::commit`] instead so the saga save shares the step's
    /// transaction.
    async fn save_saga(&self, saga: &SagaLog) -> Result<()>;
}

/// Publisher-side access to the outbox (C2). Appends happen only inside
/// [`Storage::commit`].
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Oldest-first scan of events that are unpublished and still have
    /// attempts left.
    async fn find_unpublished(&self, batch_size: usize) -> Result<Vec<OutboxEvent>>;

    /// Persists publish metadata (`is_published`, `publish_attempts`,
    /// `last_error`, `published_at`) for one event. Payload and routing are
    /// immutable.
    async fn save_publish_state(&self, event: &OutboxEvent) -> Result<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>>;
    async fn find_order_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<Order>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn find_payment(&self, id: PaymentId) -> Result<Option<Payment>>;
    async fn find_payment_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<Payment>>;
    async fn find_payment_by_saga(&self, saga_id: SagaId) -> Result<Option<Payment>>;
    async fn find_payment_by_compensation_key(
        &self,
        key: &IdempotencyKey,
        order_id: OrderId,
    ) -> Result<Option<Payment>>;
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn find_inventory(&self, product_id: &ProductId) -> Result<Option<InventoryLevel>>;
    async fn find_inventory_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<InventoryLevel>>;
    async fn find_inventory_by_compensation_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<InventoryLevel>>;
}

#[async_trait]
pub trait ShipmentStore: Send + Sync {
    async fn find_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>>;
    async fn find_shipment_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<Shipment>>;
    async fn find_shipment_by_saga(&self, saga_id: SagaId) -> Result<Option<Shipment>>;
    async fn find_shipment_by_compensation_key(
        &self,
        key: &IdempotencyKey,
        order_id: OrderId,
    ) -> Result<Option<Shipment>>;
}

/// Full storage backend: all reads plus the atomic commit.
#[async_trait]
pub trait Storage:
    SagaLogStore + OutboxStore + OrderStore + PaymentStore + InventoryStore + ShipmentStore + 'static
{
    /// Applies a [`StateChange`] in a single local transaction.
    ///
    /// If any write fails, none are visible; a unique violation on an
    /// idempotency key surfaces as
    /// [`StoreError::DuplicateIdempotencyKey`](crate::StoreError::DuplicateIdempotencyKey).
    async fn commit(&self, change: StateChange) -> Result<()>;
}
