//! Transactional outbox events.
//!
//! An outbox event is appended in the same local transaction as the state
//! change that produced it; a background publisher relays it over HTTP. The
//! publisher only ever mutates the publish metadata fields.

use chrono::{DateTime, Utc};
use common::{EventId, IdempotencyKey, OrderId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Default publish attempts before an event is terminally failed.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// The closed set of inter-service event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    OrderCreated,
    PaymentProcessed,
    PaymentFailed,
    InventoryUpdated,
    InventoryFailed,
    OrderShipped,
    OrderDelivered,
    OrderCompensated,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OrderCreated => "OrderCreated",
            EventType::PaymentProcessed => "PaymentProcessed",
            EventType::PaymentFailed => "PaymentFailed",
            EventType::InventoryUpdated => "InventoryUpdated",
            EventType::InventoryFailed => "InventoryFailed",
            EventType::OrderShipped => "OrderShipped",
            EventType::OrderDelivered => "OrderDelivered",
            EventType::OrderCompensated => "OrderCompensated",
        }
    }

    /// Where this event is delivered: the target service and the endpoint
    /// below its `/api/v1` prefix.
    ///
    /// `OrderShipped`/`OrderDelivered` have no route: delivery is the final
    /// step and the saga terminates without a successor event.
    pub fn route(&self) -> Option<(TargetService, &'static str)> {
        match self {
            EventType::OrderCreated => Some((TargetService::Payment, "/payment/process")),
            EventType::PaymentProcessed => Some((TargetService::Inventory, "/inventory/update")),
            EventType::PaymentFailed => Some((TargetService::Order, "/order/compensate")),
            EventType::InventoryUpdated => Some((TargetService::Shipping, "/shipping/deliver")),
            EventType::InventoryFailed => Some((TargetService::Payment, "/payment/refund")),
            EventType::OrderCompensated => Some((TargetService::Order, "/order/compensate")),
            EventType::OrderShipped | EventType::OrderDelivered => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OrderCreated" => Ok(EventType::OrderCreated),
            "PaymentProcessed" => Ok(EventType::PaymentProcessed),
            "PaymentFailed" => Ok(EventType::PaymentFailed),
            "InventoryUpdated" => Ok(EventType::InventoryUpdated),
            "InventoryFailed" => Ok(EventType::InventoryFailed),
            "OrderShipped" => Ok(EventType::OrderShipped),
            "OrderDelivered" => Ok(EventType::OrderDelivered),
            "OrderCompensated" => Ok(EventType::OrderCompensated),
            other => Err(DomainError::UnknownValue {
                what: "event type",
                value: other.to_string(),
            }),
        }
    }
}

/// The four participant services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetService {
    Order,
    Payment,
    Inventory,
    Shipping,
}

impl TargetService {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetService::Order => "order",
            TargetService::Payment => "payment",
            TargetService::Inventory => "inventory",
            TargetService::Shipping => "shipping",
        }
    }
}

impl std::fmt::Display for TargetService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TargetService {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" => Ok(TargetService::Order),
            "payment" => Ok(TargetService::Payment),
            "inventory" => Ok(TargetService::Inventory),
            "shipping" => Ok(TargetService::Shipping),
            other => Err(DomainError::UnknownValue {
                what: "target service",
                value: other.to_string(),
            }),
        }
    }
}

/// One pending (or published) outbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: EventId,
    pub aggregate_id: OrderId,
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub target_service: TargetService,
    pub target_endpoint: String,
    pub is_published: bool,
    pub publish_attempts: u32,
    pub max_retries: u32,
    pub last_error: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OutboxEvent {
    /// Builds an event routed by its type's compile-time target mapping.
    pub fn routed(
        aggregate_id: OrderId,
        event_type: EventType,
        payload: serde_json::Value,
        max_retries: u32,
    ) -> Result<Self, DomainError> {
        let (target_service, target_endpoint) = event_type
            .route()
            .ok_or(DomainError::UnroutableEvent(event_type))?;
        Ok(Self {
            id: EventId::new(),
            aggregate_id,
            event_type,
            payload,
            target_service,
            target_endpoint: target_endpoint.to_string(),
            is_published: false,
            publish_attempts: 0,
            max_retries,
            last_error: None,
            published_at: None,
            created_at: Utc::now(),
        })
    }

    /// Deterministic outbound idempotency key: `{aggregateId}-{eventType}`.
    ///
    /// Each `(aggregate, event type)` pair occurs at most once per saga, so
    /// replays of the same event always carry the same key.
    pub fn outbound_idempotency_key(&self) -> IdempotencyKey {
        IdempotencyKey::new(format!("{}-{}", self.aggregate_id, self.event_type))
    }

    /// Marks the event delivered.
    pub fn mark_published(&mut self) {
        self.is_published = true;
        self.published_at = Some(Utc::now());
    }

    /// Records a failed publish attempt.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.publish_attempts += 1;
        self.last_error = Some(error.into());
    }

    /// Unpublished with attempts exhausted: surfaced, never retried.
    pub fn is_terminally_failed(&self) -> bool {
        !self.is_published && self.publish_attempts >= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: EventType) -> OutboxEvent {
        OutboxEvent::routed(
            OrderId::new(),
            event_type,
            serde_json::json!({"orderId": "x"}),
            DEFAULT_MAX_RETRIES,
        )
        .unwrap()
    }

    #[test]
    fn forward_chain_routing() {
        assert_eq!(
            EventType::OrderCreated.route(),
            Some((TargetService::Payment, "/payment/process"))
        );
        assert_eq!(
            EventType::PaymentProcessed.route(),
            Some((TargetService::Inventory, "/inventory/update"))
        );
        assert_eq!(
            EventType::InventoryUpdated.route(),
            Some((TargetService::Shipping, "/shipping/deliver"))
        );
    }

    #[test]
    fn backward_chain_routing() {
        assert_eq!(
            EventType::PaymentFailed.route(),
            Some((TargetService::Order, "/order/compensate"))
        );
        assert_eq!(
            EventType::InventoryFailed.route(),
            Some((TargetService::Payment, "/payment/refund"))
        );
        assert_eq!(
            EventType::OrderCompensated.route(),
            Some((TargetService::Order, "/order/compensate"))
        );
    }

    #[test]
    fn terminal_events_are_unroutable() {
        assert_eq!(EventType::OrderShipped.route(), None);
        assert_eq!(EventType::OrderDelivered.route(), None);
        let err = OutboxEvent::routed(
            OrderId::new(),
            EventType::OrderDelivered,
            serde_json::Value::Null,
            DEFAULT_MAX_RETRIES,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DomainError::UnroutableEvent(EventType::OrderDelivered)
        ));
    }

    #[test]
    fn outbound_key_is_deterministic() {
        let mut ev = event(EventType::OrderCreated);
        let key = ev.outbound_idempotency_key();
        assert_eq!(
            key.as_str(),
            format!("{}-OrderCreated", ev.aggregate_id).as_str()
        );
        // Replays keep the same key.
        ev.record_failure("timeout");
        assert_eq!(ev.outbound_idempotency_key(), key);
    }

    #[test]
    fn failure_accounting() {
        let mut ev = event(EventType::OrderCreated);
        assert!(!ev.is_terminally_failed());

        for _ in 0..DEFAULT_MAX_RETRIES {
            ev.record_failure("connection refused");
        }
        assert_eq!(ev.publish_attempts, DEFAULT_MAX_RETRIES);
        assert_eq!(ev.last_error.as_deref(), Some("connection refused"));
        assert!(ev.is_terminally_failed());
        assert!(!ev.is_published);
    }

    #[test]
    fn publish_marks_metadata_only() {
        let mut ev = event(EventType::PaymentProcessed);
        let payload = ev.payload.clone();
        ev.mark_published();
        assert!(ev.is_published);
        assert!(ev.published_at.is_some());
        assert_eq!(ev.payload, payload);
        assert!(!ev.is_terminally_failed());
    }

    #[test]
    fn event_type_from_str_roundtrip() {
        for ty in [
            EventType::OrderCreated,
            EventType::PaymentProcessed,
            EventType::PaymentFailed,
            EventType::InventoryUpdated,
            EventType::InventoryFailed,
            EventType::OrderShipped,
            EventType::OrderDelivered,
            EventType::OrderCompensated,
        ] {
            assert_eq!(ty.as_str().parse::<EventType>().unwrap(), ty);
        }
        assert!("OrderRejected".parse::<EventType>().is_err());
    }
}
