//! Inventory service: stock reservation and restoration.

use std::sync::Arc;

use common::{ApiResponse, IdempotencyKey, ProductId};
use domain::messages::{
    CompensateInventoryRequest, DeliverOrderRequest, InitializeInventoryRequest, InventoryData,
    RefundPaymentRequest, UpdateInventoryRequest,
};
use domain::{
    DEFAULT_INITIAL_STOCK, DomainError, EventType, InventoryLevel, OutboxEvent, SagaStatus,
    StepName,
};
use store::{StateChange, Storage};

use crate::config::ProtocolConfig;
use crate::error::Result;

/// Handles `/inventory/update`, `/inventory/compensate`,
/// `/inventory/initialize`, and inventory reads.
#[derive(Clone)]
pub struct InventoryHandler<S> {
    store: Arc<S>,
    config: ProtocolConfig,
}

impl<S: Storage> InventoryHandler<S> {
    pub fn new(store: Arc<S>, config: ProtocolConfig) -> Self {
        Self { store, config }
    }

    /// Forward step: reserve stock and enqueue delivery, or fail the step
    /// and enqueue the refund chain. Stock for an unseen product is
    /// auto-created at [`DEFAULT_INITIAL_STOCK`] units.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, product = %request.product_id))]
    pub async fn update(
        &self,
        key: IdempotencyKey,
        request: UpdateInventoryRequest,
    ) -> Result<ApiResponse<InventoryData>> {
        if let Some(level) = self.store.find_inventory_by_idempotency_key(&key).await? {
            tracing::info!(product = %level.product_id, "replayed inventory update");
            return Ok(ApiResponse::ok(InventoryData::from(&level)));
        }

        let Some(mut saga) = self.store.find_saga(request.saga_log_id).await? else {
            return Ok(ApiResponse::failure("SagaLog not found"));
        };

        saga.begin_step(StepName::UpdateInventory);

        let mut level = match self.store.find_inventory(&request.product_id).await? {
            Some(level) => level,
            None => InventoryLevel::with_stock(request.product_id.clone(), DEFAULT_INITIAL_STOCK),
        };

        match level.reserve(request.quantity) {
            Ok(()) => {
                level.idempotency_key = Some(key);
                saga.transition(SagaStatus::InProgress)?;
                saga.complete_step(StepName::UpdateInventory)?;

                let payload = serde_json::to_value(DeliverOrderRequest {
                    customer_id: saga.customer_id,
                    order_id: request.order_id,
                    saga_log_id: saga.saga_id,
                })?;
                let event = OutboxEvent::routed(
                    request.order_id,
                    EventType::InventoryUpdated,
                    payload,
                    self.config.max_publish_retries,
                )?;

                let data = InventoryData::from(&level);
                self.store
                    .commit(
                        StateChange::new()
                            .with_inventory(level)
                            .with_saga(saga)
                            .with_event(event),
                    )
                    .await?;

                metrics::counter!("inventory_reservations").increment(1);
                tracing::info!(reserved = request.quantity, "inventory reserved");
                Ok(ApiResponse::ok(data))
            }
            Err(err @ DomainError::InsufficientInventory { .. }) => {
                let reason = err.to_string();
                saga.fail_step(StepName::UpdateInventory, reason.clone());
                saga.transition(SagaStatus::Compensating)?;

                let payload = serde_json::to_value(RefundPaymentRequest {
                    order_id: request.order_id,
                    saga_log_id: saga.saga_id,
                })?;
                let event = OutboxEvent::routed(
                    request.order_id,
                    EventType::InventoryFailed,
                    payload,
                    self.config.max_publish_retries,
                )?;

                // The auto-created level persists even on failure; the step
                // changed nothing else about it.
                self.store
                    .commit(
                        StateChange::new()
                            .with_inventory(level)
                            .with_saga(saga)
                            .with_event(event),
                    )
                    .await?;

                metrics::counter!("inventory_rejections").increment(1);
                tracing::warn!(%reason, "reservation rejected, refund enqueued");
                Ok(ApiResponse::failure(reason))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Compensation step: restores stock and releases the reservation.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, product = %request.product_id))]
    pub async fn compensate(
        &self,
        key: IdempotencyKey,
        request: CompensateInventoryRequest,
    ) -> Result<ApiResponse<InventoryData>> {
        if self
            .store
            .find_inventory_by_compensation_key(&key)
            .await?
            .is_some()
        {
            return Ok(ApiResponse::acknowledged("already compensated"));
        }

        let Some(mut level) = self.store.find_inventory(&request.product_id).await? else {
            return Ok(ApiResponse::failure("Inventory not found"));
        };
        let Some(mut saga) = self.store.find_saga(request.saga_log_id).await? else {
            return Ok(ApiResponse::failure("SagaLog not found"));
        };

        level.restore(request.quantity);
        level.compensation_key = Some(key);
        saga.compensate_step(StepName::UpdateInventory);

        let data = InventoryData::from(&level);
        self.store
            .commit(StateChange::new().with_inventory(level).with_saga(saga))
            .await?;

        metrics::counter!("inventory_restored").increment(1);
        tracing::info!(restored = request.quantity, "inventory restored");
        Ok(ApiResponse::ok_with_message(data, "inventory restored"))
    }

    /// Sets the stock level for a product, creating it if needed.
    #[tracing::instrument(skip(self, request), fields(product = %request.product_id))]
    pub async fn initialize(
        &self,
        request: InitializeInventoryRequest,
    ) -> Result<ApiResponse<InventoryData>> {
        let level = match self.store.find_inventory(&request.product_id).await? {
            Some(mut existing) => {
                existing.quantity = request.quantity;
                existing
            }
            None => InventoryLevel::with_stock(request.product_id.clone(), request.quantity),
        };

        let data = InventoryData::from(&level);
        self.store
            .commit(StateChange::new().with_inventory(level))
            .await?;
        Ok(ApiResponse::ok(data))
    }

    /// Read side: stock level by product.
    pub async fn get(&self, product_id: &ProductId) -> Result<ApiResponse<InventoryData>> {
        match self.store.find_inventory(product_id).await? {
            Some(level) => Ok(ApiResponse::ok(InventoryData::from(&level))),
            None => Ok(ApiResponse::failure("Inventory not found")),
        }
    }
}
