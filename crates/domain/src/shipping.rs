//! Shipping participant record.

use chrono::{DateTime, Utc};
use common::{CustomerId, IdempotencyKey, OrderId, SagaId, ShipmentId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    Shipped,
    Cancelled,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Shipped => "SHIPPED",
            ShipmentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ShipmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SHIPPED" => Ok(ShipmentStatus::Shipped),
            "CANCELLED" => Ok(ShipmentStatus::Cancelled),
            other => Err(DomainError::UnknownValue {
                what: "shipment status",
                value: other.to_string(),
            }),
        }
    }
}

/// A shipment row, created when the final saga step delivers the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub status: ShipmentStatus,
    pub idempotency_key: IdempotencyKey,
    pub compensation_key: Option<IdempotencyKey>,
    pub created_at: DateTime<Utc>,
}

impl Shipment {
    pub fn ship(
        saga_id: SagaId,
        order_id: OrderId,
        customer_id: CustomerId,
        idempotency_key: IdempotencyKey,
    ) -> Self {
        Self {
            id: ShipmentId::new(),
            saga_id,
            order_id,
            customer_id,
            status: ShipmentStatus::Shipped,
            idempotency_key,
            compensation_key: None,
            created_at: Utc::now(),
        }
    }

    pub fn cancel(&mut self, compensation_key: IdempotencyKey) {
        self.status = ShipmentStatus::Cancelled;
        if self.compensation_key.is_none() {
            self.compensation_key = Some(compensation_key);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ShipmentStatus::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ship_and_cancel() {
        let mut shipment = Shipment::ship(
            SagaId::new(),
            OrderId::new(),
            CustomerId::new(),
            IdempotencyKey::new("key-1"),
        );
        assert_eq!(shipment.status, ShipmentStatus::Shipped);

        shipment.cancel(IdempotencyKey::new("cancel-1"));
        assert!(shipment.is_cancelled());
        assert_eq!(
            shipment.compensation_key.as_ref().unwrap().as_str(),
            "cancel-1"
        );
    }
}
