//! Shipping service: the final forward step and its compensation.

use std::sync::Arc;

use common::{ApiResponse, IdempotencyKey, ShipmentId};
use domain::messages::{CancelShipmentRequest, DeliverOrderRequest, ShipmentData};
use domain::{SagaStatus, Shipment, StepName};
use store::{StateChange, Storage};

use crate::error::Result;

/// Handles `/shipping/deliver`, `/shipping/cancel`, and shipment reads.
///
/// Delivery is the terminal step: it appends no successor event, so this
/// handler needs no protocol configuration.
#[derive(Clone)]
pub struct ShippingHandler<S> {
    store: Arc<S>,
}

impl<S: Storage> ShippingHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Final forward step: creates the shipment and closes the saga as
    /// COMPLETED. No successor event is enqueued.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, saga_id = %request.saga_log_id))]
    pub async fn deliver(
        &self,
        key: IdempotencyKey,
        request: DeliverOrderRequest,
    ) -> Result<ApiResponse<ShipmentData>> {
        if let Some(existing) = self.store.find_shipment_by_idempotency_key(&key).await? {
            tracing::info!(shipping_id = %existing.id, "replayed delivery");
            return Ok(ApiResponse::ok(ShipmentData::from(&existing)));
        }

        let Some(mut saga) = self.store.find_saga(request.saga_log_id).await? else {
            return Ok(ApiResponse::failure("SagaLog not found"));
        };

        saga.begin_step(StepName::DeliverOrder);
        let shipment = Shipment::ship(saga.saga_id, request.order_id, request.customer_id, key);
        saga.transition(SagaStatus::InProgress)?;
        saga.complete_step(StepName::DeliverOrder)?;
        saga.mark_completed()?;

        let data = ShipmentData::from(&shipment);
        self.store
            .commit(StateChange::new().with_shipment(shipment).with_saga(saga))
            .await?;

        metrics::counter!("saga_completed").increment(1);
        tracing::info!(shipping_id = %data.shipping_id, saga_id = %request.saga_log_id, "order delivered, saga completed");
        Ok(ApiResponse::ok(data))
    }

    /// Compensation step: cancels a shipment.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, saga_id = %request.saga_log_id))]
    pub async fn cancel(
        &self,
        key: IdempotencyKey,
        request: CancelShipmentRequest,
    ) -> Result<ApiResponse<ShipmentData>> {
        if self
            .store
            .find_shipment_by_compensation_key(&key, request.order_id)
            .await?
            .is_some()
        {
            return Ok(ApiResponse::acknowledged("already cancelled"));
        }

        let Some(mut shipment) = self
            .store
            .find_shipment_by_saga(request.saga_log_id)
            .await?
        else {
            return Ok(ApiResponse::failure("Shipment not found"));
        };
        if shipment.is_cancelled() {
            return Ok(ApiResponse::acknowledged("already cancelled"));
        }
        let Some(mut saga) = self.store.find_saga(request.saga_log_id).await? else {
            return Ok(ApiResponse::failure("SagaLog not found"));
        };

        shipment.cancel(key);
        saga.compensate_step(StepName::DeliverOrder);

        let data = ShipmentData::from(&shipment);
        self.store
            .commit(StateChange::new().with_shipment(shipment).with_saga(saga))
            .await?;

        metrics::counter!("shipments_cancelled").increment(1);
        tracing::info!(shipping_id = %data.shipping_id, "shipment cancelled");
        Ok(ApiResponse::ok_with_message(data, "shipment cancelled"))
    }

    /// Read side: shipment by id.
    pub async fn get(&self, shipping_id: ShipmentId) -> Result<ApiResponse<ShipmentData>> {
        match self.store.find_shipment(shipping_id).await? {
            Some(shipment) => Ok(ApiResponse::ok(ShipmentData::from(&shipment))),
            None => Ok(ApiResponse::failure("Shipment not found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CustomerId, Money, OrderId, ProductId};
    use domain::SagaLog;
    use store::{InMemoryStorage, SagaLogStore};
    use uuid::Uuid;

    async fn seeded_saga(store: &InMemoryStorage) -> SagaLog {
        let mut saga = SagaLog::start(
            Uuid::new_v4(),
            CustomerId::new(),
            ProductId::new("SKU-001"),
            2,
            Money::from_cents(4000),
        );
        saga.order_id = Some(OrderId::new());
        for step in [
            StepName::CreateOrder,
            StepName::ProcessPayment,
            StepName::UpdateInventory,
        ] {
            saga.begin_step(step);
            saga.complete_step(step).unwrap();
        }
        saga.transition(SagaStatus::InProgress).unwrap();
        store.save_saga(&saga).await.unwrap();
        saga
    }

    fn handler(store: Arc<InMemoryStorage>) -> ShippingHandler<InMemoryStorage> {
        ShippingHandler::new(store)
    }

    #[tokio::test]
    async fn deliver_completes_the_saga() {
        let store = Arc::new(InMemoryStorage::new());
        let saga = seeded_saga(&store).await;
        let handler = handler(store.clone());

        let response = handler
            .deliver(
                IdempotencyKey::new("key-1"),
                DeliverOrderRequest {
                    customer_id: saga.customer_id,
                    order_id: saga.order_id.unwrap(),
                    saga_log_id: saga.saga_id,
                },
            )
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.data.unwrap().status, "SHIPPED");

        let saved = store.find_saga(saga.saga_id).await.unwrap().unwrap();
        assert_eq!(saved.status, SagaStatus::Completed);
        assert!(saved.all_steps_completed());

        // Terminal step: nothing new in the outbox.
        assert_eq!(store.outbox_len().await, 0);
    }

    #[tokio::test]
    async fn replayed_delivery_returns_the_same_shipment() {
        let store = Arc::new(InMemoryStorage::new());
        let saga = seeded_saga(&store).await;
        let handler = handler(store.clone());
        let key = IdempotencyKey::new("key-1");
        let request = DeliverOrderRequest {
            customer_id: saga.customer_id,
            order_id: saga.order_id.unwrap(),
            saga_log_id: saga.saga_id,
        };

        let first = handler.deliver(key.clone(), request.clone()).await.unwrap();
        let second = handler.deliver(key, request).await.unwrap();
        assert_eq!(first.data, second.data);
    }

    #[tokio::test]
    async fn cancel_after_delivery() {
        let store = Arc::new(InMemoryStorage::new());
        let saga = seeded_saga(&store).await;
        let handler = handler(store.clone());

        handler
            .deliver(
                IdempotencyKey::new("key-1"),
                DeliverOrderRequest {
                    customer_id: saga.customer_id,
                    order_id: saga.order_id.unwrap(),
                    saga_log_id: saga.saga_id,
                },
            )
            .await
            .unwrap();

        let cancel = CancelShipmentRequest {
            order_id: saga.order_id.unwrap(),
            saga_log_id: saga.saga_id,
        };
        let key = IdempotencyKey::new("cancel-1");
        let first = handler.cancel(key.clone(), cancel.clone()).await.unwrap();
        assert!(first.success);
        assert_eq!(first.data.unwrap().status, "CANCELLED");

        let second = handler.cancel(key, cancel).await.unwrap();
        assert_eq!(second.message.as_deref(), Some("already cancelled"));
    }
}
