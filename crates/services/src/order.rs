//! Order service: saga initiation and the final compensation step.

use std::sync::Arc;

use common::{ApiResponse, IdempotencyKey, OrderId};
use domain::messages::{
    CompensateOrderRequest, OrderData, ProcessPaymentRequest, StartOrderData, StartOrderRequest,
};
use domain::{EventType, Order, OutboxEvent, SagaLog, SagaStatus, StepName};
use store::{StateChange, Storage, StoreError};
use uuid::Uuid;

use crate::config::ProtocolConfig;
use crate::error::Result;

/// Handles `/order/start`, `/order/compensate`, and order reads.
#[derive(Clone)]
pub struct OrderHandler<S> {
    store: Arc<S>,
    config: ProtocolConfig,
}

impl<S: Storage> OrderHandler<S> {
    pub fn new(store: Arc<S>, config: ProtocolConfig) -> Self {
        Self { store, config }
    }

    /// Initiates a saga: persists the saga log, the CONFIRMED order row, and
    /// the `OrderCreated` event to Payment in one transaction.
    ///
    /// The caller's idempotency key doubles as the saga log's unique key, so
    /// any number of retries (sequential or racing) resolve to one saga.
    #[tracing::instrument(skip(self, request), fields(idempotency_key = %key))]
    pub async fn start(
        &self,
        key: Uuid,
        request: StartOrderRequest,
    ) -> Result<ApiResponse<StartOrderData>> {
        if let Some(existing) = self.store.find_saga_by_idempotency_key(key).await? {
            tracing::info!(saga_id = %existing.saga_id, "replayed saga start");
            return Ok(Self::replay(&existing));
        }

        let mut saga = SagaLog::start(
            key,
            request.customer_id,
            request.product_id.clone(),
            request.quantity,
            request.total_price,
        );
        let order = Order::create(
            saga.saga_id,
            request.customer_id,
            request.product_id,
            request.quantity,
            request.total_price,
            IdempotencyKey::from(key),
        );
        saga.order_id = Some(order.id);
        saga.begin_step(StepName::CreateOrder);
        saga.complete_step(StepName::CreateOrder)?;

        let payload = serde_json::to_value(ProcessPaymentRequest {
            amount: request.total_price,
            customer_id: request.customer_id,
            order_id: order.id,
            saga_log_id: saga.saga_id,
        })?;
        let event = OutboxEvent::routed(
            order.id,
            EventType::OrderCreated,
            payload,
            self.config.max_publish_retries,
        )?;

        let data = StartOrderData {
            order_id: order.id,
            saga_log_id: saga.saga_id,
        };

        let change = StateChange::new()
            .with_order(order)
            .with_saga(saga)
            .with_event(event);
        match self.store.commit(change).await {
            Ok(()) => {
                metrics::counter!("saga_started").increment(1);
                tracing::info!(saga_id = %data.saga_log_id, order_id = %data.order_id, "saga started");
                Ok(ApiResponse::ok(data))
            }
            // Lost an initiation race: surface the winner's result.
            Err(StoreError::DuplicateIdempotencyKey) => {
                match self.store.find_saga_by_idempotency_key(key).await? {
                    Some(existing) => Ok(Self::replay(&existing)),
                    None => Err(StoreError::DuplicateIdempotencyKey.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn replay(saga: &SagaLog) -> ApiResponse<StartOrderData> {
        match saga.order_id {
            Some(order_id) => ApiResponse::ok(StartOrderData {
                order_id,
                saga_log_id: saga.saga_id,
            }),
            None => ApiResponse::failure("Saga exists without an order"),
        }
    }

    /// Terminal compensation step: marks the order and the saga COMPENSATED.
    ///
    /// The key is optional because `/order/compensate` is also an operator
    /// endpoint; publisher-delivered requests always carry one.
    #[tracing::instrument(skip(self))]
    pub async fn compensate(
        &self,
        key: Option<IdempotencyKey>,
        request: CompensateOrderRequest,
    ) -> Result<ApiResponse<OrderData>> {
        let Some(mut order) = self.store.find_order(request.order_id).await? else {
            return Ok(ApiResponse::failure("Order not found"));
        };
        if order.is_compensated() {
            return Ok(ApiResponse::ok_with_message(
                OrderData::from(&order),
                "already compensated",
            ));
        }
        let Some(mut saga) = self.store.find_saga(order.saga_id).await? else {
            return Ok(ApiResponse::failure("SagaLog not found"));
        };

        order.compensate(key);
        saga.compensate_step(StepName::CreateOrder);
        if let Err(err) = saga.transition(SagaStatus::Compensating) {
            return Ok(ApiResponse::failure(err.to_string()));
        }
        if let Err(err) = saga.mark_compensated() {
            return Ok(ApiResponse::failure(err.to_string()));
        }

        let data = OrderData::from(&order);
        self.store
            .commit(StateChange::new().with_order(order).with_saga(saga))
            .await?;

        metrics::counter!("saga_compensated").increment(1);
        tracing::info!(order_id = %request.order_id, "order compensated, saga closed");
        Ok(ApiResponse::ok_with_message(data, "order compensated"))
    }

    /// Read side: order by id.
    pub async fn get(&self, order_id: OrderId) -> Result<ApiResponse<OrderData>> {
        match self.store.find_order(order_id).await? {
            Some(order) => Ok(ApiResponse::ok(OrderData::from(&order))),
            None => Ok(ApiResponse::failure("Order not found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CustomerId, Money, ProductId};
    use store::{InMemoryStorage, OutboxStore, SagaLogStore};

    fn handler() -> OrderHandler<InMemoryStorage> {
        OrderHandler::new(Arc::new(InMemoryStorage::new()), ProtocolConfig::default())
    }

    fn request() -> StartOrderRequest {
        StartOrderRequest {
            customer_id: CustomerId::new(),
            product_id: ProductId::new("SKU-001"),
            quantity: 2,
            total_price: Money::from_cents(4000),
        }
    }

    #[tokio::test]
    async fn start_persists_saga_order_and_event_atomically() {
        let handler = handler();
        let response = handler.start(Uuid::new_v4(), request()).await.unwrap();
        assert!(response.success);

        let data = response.data.unwrap();
        let saga = handler
            .store
            .find_saga(data.saga_log_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saga.status, SagaStatus::Started);
        assert_eq!(
            saga.step(StepName::CreateOrder).status,
            domain::StepStatus::Completed
        );
        assert_eq!(saga.order_id, Some(data.order_id));

        let pending = handler.store.find_unpublished(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, EventType::OrderCreated);
        assert_eq!(pending[0].aggregate_id, data.order_id);
    }

    #[tokio::test]
    async fn duplicate_start_replays_the_original() {
        let handler = handler();
        let key = Uuid::new_v4();

        let first = handler.start(key, request()).await.unwrap();
        let second = handler.start(key, request()).await.unwrap();
        assert_eq!(first.data, second.data);

        assert_eq!(handler.store.saga_count().await, 1);
        assert_eq!(handler.store.outbox_len().await, 1);
    }

    #[tokio::test]
    async fn parallel_starts_with_one_key_produce_one_saga() {
        let handler = handler();
        let key = Uuid::new_v4();
        let req = request();

        let (a, b, c) = tokio::join!(
            handler.start(key, req.clone()),
            handler.start(key, req.clone()),
            handler.start(key, req.clone()),
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(a.data, b.data);
        assert_eq!(b.data, c.data);
        assert_eq!(handler.store.saga_count().await, 1);
        assert_eq!(handler.store.outbox_len().await, 1);
    }

    #[tokio::test]
    async fn compensate_unknown_order_is_a_soft_failure() {
        let handler = handler();
        let response = handler
            .compensate(
                None,
                CompensateOrderRequest {
                    order_id: OrderId::new(),
                },
            )
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Order not found"));
    }
}
