//! The unit of atomic work a participant commits.

use domain::{InventoryLevel, Order, OutboxEvent, Payment, SagaLog, Shipment};

/// The participant row touched by a forward or compensation step.
///
/// Writes are upserts keyed by the row's primary key, so replaying a commit
/// is harmless.
#[derive(Debug, Clone)]
pub enum ParticipantWrite {
    Order(Order),
    Payment(Payment),
    Inventory(InventoryLevel),
    Shipment(Shipment),
}

/// Everything one saga step persists, applied in a single transaction:
/// at most one participant row, at most one saga-log upsert, and any outbox
/// events the step produces.
#[derive(Debug, Clone, Default)]
pub struct StateChange {
    pub participant: Option<ParticipantWrite>,
    pub saga: Option<SagaLog>,
    pub events: Vec<OutboxEvent>,
}

impl StateChange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.participant = Some(ParticipantWrite::Order(order));
        self
    }

    pub fn with_payment(mut self, payment: Payment) -> Self {
        self.participant = Some(ParticipantWrite::Payment(payment));
        self
    }

    pub fn with_inventory(mut self, level: InventoryLevel) -> Self {
        self.participant = Some(ParticipantWrite::Inventory(level));
        self
    }

    pub fn with_shipment(mut self, shipment: Shipment) -> Self {
        self.participant = Some(ParticipantWrite::Shipment(shipment));
        self
    }

    pub fn with_saga(mut self, saga: SagaLog) -> Self {
        self.saga = Some(saga);
        self
    }

    pub fn with_event(mut self, event: OutboxEvent) -> Self {
        self.events.push(event);
        self
    }
}
