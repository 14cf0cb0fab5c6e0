//! Payment service: charge authorization and refunds.

use std::sync::Arc;

use common::{ApiResponse, IdempotencyKey, PaymentId};
use domain::messages::{
    CompensateOrderRequest, PaymentData, ProcessPaymentRequest, RefundPaymentRequest,
    UpdateInventoryRequest,
};
use domain::{EventType, OutboxEvent, Payment, SagaStatus, StepName};
use store::{StateChange, Storage};

use crate::config::ProtocolConfig;
use crate::error::Result;
use crate::gateway::PaymentGateway;

/// Handles `/payment/process`, `/payment/refund`, and payment reads.
#[derive(Clone)]
pub struct PaymentHandler<S, G> {
    store: Arc<S>,
    gateway: G,
    config: ProtocolConfig,
}

impl<S: Storage, G: PaymentGateway> PaymentHandler<S, G> {
    pub fn new(store: Arc<S>, gateway: G, config: ProtocolConfig) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    /// Forward step: authorize the charge and enqueue the inventory update,
    /// or record the failure and enqueue the compensation chain.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, saga_id = %request.saga_log_id))]
    pub async fn process(
        &self,
        key: IdempotencyKey,
        request: ProcessPaymentRequest,
    ) -> Result<ApiResponse<PaymentData>> {
        if let Some(existing) = self.store.find_payment_by_idempotency_key(&key).await? {
            tracing::info!(payment_id = %existing.id, "replayed payment");
            return Ok(ApiResponse::ok(PaymentData::from(&existing)));
        }

        let Some(mut saga) = self.store.find_saga(request.saga_log_id).await? else {
            return Ok(ApiResponse::failure("SagaLog not found"));
        };

        saga.begin_step(StepName::ProcessPayment);

        match self
            .gateway
            .authorize(request.order_id, request.customer_id, request.amount)
            .await
        {
            Ok(()) => {
                let payment = Payment::capture(
                    saga.saga_id,
                    request.order_id,
                    request.customer_id,
                    request.amount,
                    key,
                );
                saga.transition(SagaStatus::InProgress)?;
                saga.complete_step(StepName::ProcessPayment)?;

                let payload = serde_json::to_value(UpdateInventoryRequest {
                    order_id: request.order_id,
                    product_id: saga.product_id.clone(),
                    quantity: saga.quantity,
                    saga_log_id: saga.saga_id,
                })?;
                let event = OutboxEvent::routed(
                    request.order_id,
                    EventType::PaymentProcessed,
                    payload,
                    self.config.max_publish_retries,
                )?;

                let data = PaymentData::from(&payment);
                self.store
                    .commit(
                        StateChange::new()
                            .with_payment(payment)
                            .with_saga(saga)
                            .with_event(event),
                    )
                    .await?;

                metrics::counter!("payments_processed").increment(1);
                tracing::info!(payment_id = %data.payment_id, "payment captured");
                Ok(ApiResponse::ok(data))
            }
            Err(declined) => {
                saga.fail_step(StepName::ProcessPayment, declined.to_string());
                saga.transition(SagaStatus::Compensating)?;

                let payload = serde_json::to_value(CompensateOrderRequest {
                    order_id: request.order_id,
                })?;
                let event = OutboxEvent::routed(
                    request.order_id,
                    EventType::PaymentFailed,
                    payload,
                    self.config.max_publish_retries,
                )?;

                self.store
                    .commit(StateChange::new().with_saga(saga).with_event(event))
                    .await?;

                metrics::counter!("payments_declined").increment(1);
                tracing::warn!(order_id = %request.order_id, %declined, "payment declined, compensation enqueued");
                Ok(ApiResponse::failure(declined.to_string()))
            }
        }
    }

    /// Compensation step: refund the captured payment and pass the backward
    /// chain on to the Order service.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, saga_id = %request.saga_log_id))]
    pub async fn refund(
        &self,
        key: IdempotencyKey,
        request: RefundPaymentRequest,
    ) -> Result<ApiResponse<PaymentData>> {
        if self
            .store
            .find_payment_by_compensation_key(&key, request.order_id)
            .await?
            .is_some()
        {
            return Ok(ApiResponse::acknowledged("already refunded"));
        }

        let Some(mut payment) = self.store.find_payment_by_saga(request.saga_log_id).await? else {
            // The backward chain cannot proceed without the forward row;
            // park the saga in FAILED for operator attention.
            if let Some(mut saga) = self.store.find_saga(request.saga_log_id).await?
                && !saga.status.is_terminal()
            {
                saga.transition(SagaStatus::Failed)?;
                self.store
                    .commit(StateChange::new().with_saga(saga))
                    .await?;
                metrics::counter!("saga_failed").increment(1);
            }
            return Ok(ApiResponse::failure("Payment not found"));
        };
        if payment.is_refunded() {
            return Ok(ApiResponse::acknowledged("already refunded"));
        }
        let Some(mut saga) = self.store.find_saga(request.saga_log_id).await? else {
            return Ok(ApiResponse::failure("SagaLog not found"));
        };

        payment.refund(key);
        saga.compensate_step(StepName::ProcessPayment);
        if let Err(err) = saga.transition(SagaStatus::Compensating) {
            return Ok(ApiResponse::failure(err.to_string()));
        }

        let payload = serde_json::to_value(CompensateOrderRequest {
            order_id: request.order_id,
        })?;
        let event = OutboxEvent::routed(
            request.order_id,
            EventType::OrderCompensated,
            payload,
            self.config.max_publish_retries,
        )?;

        let data = PaymentData::from(&payment);
        self.store
            .commit(
                StateChange::new()
                    .with_payment(payment)
                    .with_saga(saga)
                    .with_event(event),
            )
            .await?;

        metrics::counter!("payments_refunded").increment(1);
        tracing::info!(payment_id = %data.payment_id, "payment refunded");
        Ok(ApiResponse::ok_with_message(data, "payment refunded"))
    }

    /// Read side: payment by id.
    pub async fn get(&self, payment_id: PaymentId) -> Result<ApiResponse<PaymentData>> {
        match self.store.find_payment(payment_id).await? {
            Some(payment) => Ok(ApiResponse::ok(PaymentData::from(&payment))),
            None => Ok(ApiResponse::failure("Payment not found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::FixedGateway;
    use common::{CustomerId, Money, OrderId, ProductId, SagaId};
    use domain::SagaLog;
    use store::{InMemoryStorage, OutboxStore, PaymentStore, SagaLogStore};
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
        saga.begin_step(StepName::CreateOrder);
        saga.complete_step(StepName::CreateOrder).unwrap();
        store.save_saga(&saga).await.unwrap();
        saga
    }

    fn handler(
        store: Arc<InMemoryStorage>,
        gateway: FixedGateway,
    ) -> PaymentHandler<InMemoryStorage, FixedGateway> {
        PaymentHandler::new(store, gateway, ProtocolConfig::default())
    }

    fn request(saga: &SagaLog) -> ProcessPaymentRequest {
        ProcessPaymentRequest {
            amount: saga.total_price,
            customer_id: saga.customer_id,
            order_id: saga.order_id.unwrap(),
            saga_log_id: saga.saga_id,
        }
    }

    #[tokio::test]
    async fn successful_charge_advances_the_saga() {
        let store = Arc::new(InMemoryStorage::new());
        let saga = seeded_saga(&store).await;
        let handler = handler(store.clone(), FixedGateway::approving());

        let response = handler
            .process(IdempotencyKey::new("key-1"), request(&saga))
            .await
            .unwrap();
        assert!(response.success);

        let saved = store.find_saga(saga.saga_id).await.unwrap().unwrap();
        assert_eq!(saved.status, SagaStatus::InProgress);
        assert_eq!(
            saved.step(StepName::ProcessPayment).status,
            domain::StepStatus::Completed
        );

        let pending = store.find_unpublished(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, EventType::PaymentProcessed);
        // The payload is the inventory request the next hop expects.
        let next: UpdateInventoryRequest =
            serde_json::from_value(pending[0].payload.clone()).unwrap();
        assert_eq!(next.quantity, 2);
        assert_eq!(next.saga_log_id, saga.saga_id);
    }

    #[tokio::test]
    async fn declined_charge_enqueues_compensation() {
        let store = Arc::new(InMemoryStorage::new());
        let saga = seeded_saga(&store).await;
        let gateway = FixedGateway::approving();
        gateway.set_decline(true);
        let handler = handler(store.clone(), gateway);

        let response = handler
            .process(IdempotencyKey::new("key-1"), request(&saga))
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Payment declined"));

        let saved = store.find_saga(saga.saga_id).await.unwrap().unwrap();
        assert_eq!(saved.status, SagaStatus::Compensating);
        assert_eq!(
            saved.step(StepName::ProcessPayment).status,
            domain::StepStatus::Failed
        );

        let pending = store.find_unpublished(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, EventType::PaymentFailed);
        // No payment row was created for a declined charge.
        assert!(
            store
                .find_payment_by_saga(saga.saga_id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn replayed_charge_is_side_effect_free() {
        let store = Arc::new(InMemoryStorage::new());
        let saga = seeded_saga(&store).await;
        let handler = handler(store.clone(), FixedGateway::approving());
        let key = IdempotencyKey::new("key-1");

        let first = handler.process(key.clone(), request(&saga)).await.unwrap();
        let events_after_first = store.outbox_len().await;
        let second = handler.process(key, request(&saga)).await.unwrap();

        assert_eq!(first.data, second.data);
        assert_eq!(store.outbox_len().await, events_after_first);
    }

    #[tokio::test]
    async fn missing_saga_is_a_soft_failure() {
        let store = Arc::new(InMemoryStorage::new());
        let handler = handler(store, FixedGateway::approving());

        let response = handler
            .process(
                IdempotencyKey::new("key-1"),
                ProcessPaymentRequest {
                    amount: Money::from_cents(4000),
                    customer_id: CustomerId::new(),
                    order_id: OrderId::new(),
                    saga_log_id: SagaId::new(),
                },
            )
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("SagaLog not found"));
    }

    #[tokio::test]
    async fn refund_without_a_payment_parks_the_saga_as_failed() {
        let store = Arc::new(InMemoryStorage::new());
        let saga = seeded_saga(&store).await;
        let handler = handler(store.clone(), FixedGateway::approving());

        let response = handler
            .refund(
                IdempotencyKey::new("refund-1"),
                RefundPaymentRequest {
                    order_id: saga.order_id.unwrap(),
                    saga_log_id: saga.saga_id,
                },
            )
            .await
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Payment not found"));

        let saved = store.find_saga(saga.saga_id).await.unwrap().unwrap();
        assert_eq!(saved.status, SagaStatus::Failed);
    }
}
