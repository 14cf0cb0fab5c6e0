//! In-memory storage backend.
//!
//! Mirrors the Postgres backend's semantics behind a single `RwLock`, so a
//! commit is atomic and unique-key checks behave like the real constraints.
//! Used by tests and by demo mode when no `DATABASE_URL` is configured.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{IdempotencyKey, OrderId, PaymentId, ProductId, SagaId, ShipmentId};
use domain::{InventoryLevel, Order, OutboxEvent, Payment, SagaLog, Shipment};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::change::{ParticipantWrite, StateChange};
use crate::error::{Result, StoreError};
use crate::store::{
    InventoryStore, OrderStore, OutboxStore, PaymentStore, SagaLogStore, ShipmentStore, Storage,
};

#[derive(Default)]
struct Inner {
    sagas: HashMap<SagaId, SagaLog>,
    orders: HashMap<OrderId, Order>,
    payments: HashMap<PaymentId, Payment>,
    inventory: HashMap<ProductId, InventoryLevel>,
    shipments: HashMap<ShipmentId, Shipment>,
    outbox: Vec<OutboxEvent>,
}

impl Inner {
    /// Simulates the unique constraints the schema enforces. Runs before
    /// any mutation so a rejected commit leaves no partial write.
    fn check_unique_keys(&self, change: &StateChange) -> Result<()> {
        if let Some(saga) = &change.saga
            && self
                .sagas
                .values()
                .any(|s| s.idempotency_key == saga.idempotency_key && s.saga_id != saga.saga_id)
        {
            return Err(StoreError::DuplicateIdempotencyKey);
        }

        match &change.participant {
            Some(ParticipantWrite::Order(order)) => {
                if self
                    .orders
                    .values()
                    .any(|o| o.idempotency_key == order.idempotency_key && o.id != order.id)
                {
                    return Err(StoreError::DuplicateIdempotencyKey);
                }
            }
            Some(ParticipantWrite::Payment(payment)) => {
                if self
                    .payments
                    .values()
                    .any(|p| p.idempotency_key == payment.idempotency_key && p.id != payment.id)
                {
                    return Err(StoreError::DuplicateIdempotencyKey);
                }
            }
            Some(ParticipantWrite::Inventory(level)) => {
                if level.idempotency_key.is_some()
                    && self.inventory.values().any(|l| {
                        l.idempotency_key == level.idempotency_key
                            && l.product_id != level.product_id
                    })
                {
                    return Err(StoreError::DuplicateIdempotencyKey);
                }
            }
            Some(ParticipantWrite::Shipment(shipment)) => {
                if self
                    .shipments
                    .values()
                    .any(|s| s.idempotency_key == shipment.idempotency_key && s.id != shipment.id)
                {
                    return Err(StoreError::DuplicateIdempotencyKey);
                }
            }
            None => {}
        }

        Ok(())
    }
}

/// In-memory implementation of [`Storage`].
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of outbox rows, published or not. Test helper.
    pub async fn outbox_len(&self) -> usize {
        self.inner.read().await.outbox.len()
    }

    /// Number of saga logs. Test helper.
    pub async fn saga_count(&self) -> usize {
        self.inner.read().await.sagas.len()
    }

    /// Looks up a published event by aggregate and type. Test helper.
    pub async fn published_event(
        &self,
        aggregate_id: OrderId,
        event_type: domain::EventType,
    ) -> Option<OutboxEvent> {
        let inner = self.inner.read().await;
        inner
            .outbox
            .iter()
            .find(|e| e.is_published && e.aggregate_id == aggregate_id && e.event_type == event_type)
            .cloned()
    }

    /// True when a published event exists for the aggregate/type pair.
    /// Test helper.
    pub async fn has_published_event(
        &self,
        aggregate_id: OrderId,
        event_type: domain::EventType,
    ) -> bool {
        self.published_event(aggregate_id, event_type).await.is_some()
    }

    /// Highest `publish_attempts` across all outbox rows. Test helper.
    pub async fn max_publish_attempts(&self) -> u32 {
        let inner = self.inner.read().await;
        inner
            .outbox
            .iter()
            .map(|e| e.publish_attempts)
            .max()
            .unwrap_or(0)
    }
}

#[async_trait]
impl SagaLogStore for InMemoryStorage {
    async fn find_saga_by_idempotency_key(&self, key: Uuid) -> Result<Option<SagaLog>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sagas
            .values()
            .find(|s| s.idempotency_key == key)
            .cloned())
    }

    async fn find_saga(&self, saga_id: SagaId) -> Result<Option<SagaLog>> {
        Ok(self.inner.read().await.sagas.get(&saga_id).cloned())
    }

    async fn save_saga(&self, saga: &SagaLog) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner
            .sagas
            .values()
            .any(|s| s.idempotency_key == saga.idempotency_key && s.saga_id != saga.saga_id)
        {
            return Err(StoreError::DuplicateIdempotencyKey);
        }
        inner.sagas.insert(saga.saga_id, saga.clone());
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for InMemoryStorage {
    async fn find_unpublished(&self, batch_size: usize) -> Result<Vec<OutboxEvent>> {
        let inner = self.inner.read().await;
        let mut pending: Vec<OutboxEvent> = inner
            .outbox
            .iter()
            .filter(|e| !e.is_published && e.publish_attempts < e.max_retries)
            .cloned()
            .collect();
        pending.sort_by_key(|e| e.created_at);
        pending.truncate(batch_size);
        Ok(pending)
    }

    async fn save_publish_state(&self, event: &OutboxEvent) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(stored) = inner.outbox.iter_mut().find(|e| e.id == event.id) {
            stored.is_published = event.is_published;
            stored.publish_attempts = event.publish_attempts;
            stored.last_error = event.last_error.clone();
            stored.published_at = event.published_at;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStorage {
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn find_order_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<Order>> {
        let inner = self.inner.read().await;
        Ok(inner
            .orders
            .values()
            .find(|o| &o.idempotency_key == key)
            .cloned())
    }
}

#[async_trait]
impl PaymentStore for InMemoryStorage {
    async fn find_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.inner.read().await.payments.get(&id).cloned())
    }

    async fn find_payment_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<Payment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .values()
            .find(|p| &p.idempotency_key == key)
            .cloned())
    }

    async fn find_payment_by_saga(&self, saga_id: SagaId) -> Result<Option<Payment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .values()
            .find(|p| p.saga_id == saga_id)
            .cloned())
    }

    async fn find_payment_by_compensation_key(
        &self,
        key: &IdempotencyKey,
        order_id: OrderId,
    ) -> Result<Option<Payment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .values()
            .find(|p| p.compensation_key.as_ref() == Some(key) && p.order_id == order_id)
            .cloned())
    }
}

#[async_trait]
impl InventoryStore for InMemoryStorage {
    async fn find_inventory(&self, product_id: &ProductId) -> Result<Option<InventoryLevel>> {
        Ok(self.inner.read().await.inventory.get(product_id).cloned())
    }

    async fn find_inventory_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<InventoryLevel>> {
        let inner = self.inner.read().await;
        Ok(inner
            .inventory
            .values()
            .find(|l| l.idempotency_key.as_ref() == Some(key))
            .cloned())
    }

    async fn find_inventory_by_compensation_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<InventoryLevel>> {
        let inner = self.inner.read().await;
        Ok(inner
            .inventory
            .values()
            .find(|l| l.compensation_key.as_ref() == Some(key))
            .cloned())
    }
}

#[async_trait]
impl ShipmentStore for InMemoryStorage {
    async fn find_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>> {
        Ok(self.inner.read().await.shipments.get(&id).cloned())
    }

    async fn find_shipment_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<Shipment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .shipments
            .values()
            .find(|s| &s.idempotency_key == key)
            .cloned())
    }

    async fn find_shipment_by_saga(&self, saga_id: SagaId) -> Result<Option<Shipment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .shipments
            .values()
            .find(|s| s.saga_id == saga_id)
            .cloned())
    }

    async fn find_shipment_by_compensation_key(
        &self,
        key: &IdempotencyKey,
        order_id: OrderId,
    ) -> Result<Option<Shipment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .shipments
            .values()
            .find(|s| s.compensation_key.as_ref() == Some(key) && s.order_id == order_id)
            .cloned())
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn commit(&self, change: StateChange) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.check_unique_keys(&change)?;

        match change.participant {
            Some(ParticipantWrite::Order(order)) => {
                inner.orders.insert(order.id, order);
            }
            Some(ParticipantWrite::Payment(payment)) => {
                inner.payments.insert(payment.id, payment);
            }
            Some(ParticipantWrite::Inventory(level)) => {
                inner.inventory.insert(level.product_id.clone(), level);
            }
            Some(ParticipantWrite::Shipment(shipment)) => {
                inner.shipments.insert(shipment.id, shipment);
            }
            None => {}
        }

        if let Some(saga) = change.saga {
            inner.sagas.insert(saga.saga_id, saga);
        }

        inner.outbox.extend(change.events);
        Ok(())
    }
}
