//! Order participant record.

use chrono::{DateTime, Utc};
use common::{CustomerId, IdempotencyKey, Money, OrderId, ProductId, SagaId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Confirmed,
    Compensated,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Compensated => "COMPENSATED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "COMPENSATED" => Ok(OrderStatus::Compensated),
            other => Err(DomainError::UnknownValue {
                what: "order status",
                value: other.to_string(),
            }),
        }
    }
}

/// An order row, created when the saga initiates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub saga_id: SagaId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub total_price: Money,
    pub status: OrderStatus,
    pub idempotency_key: IdempotencyKey,
    pub compensation_key: Option<IdempotencyKey>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a CONFIRMED order for a freshly started saga.
    pub fn create(
        saga_id: SagaId,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u32,
        total_price: Money,
        idempotency_key: IdempotencyKey,
    ) -> Self {
        Self {
            id: OrderId::new(),
            saga_id,
            customer_id,
            product_id,
            quantity,
            total_price,
            status: OrderStatus::Confirmed,
            idempotency_key,
            compensation_key: None,
            created_at: Utc::now(),
        }
    }

    /// Applies the compensating change.
    pub fn compensate(&mut self, compensation_key: Option<IdempotencyKey>) {
        self.status = OrderStatus::Compensated;
        if self.compensation_key.is_none() {
            self.compensation_key = compensation_key;
        }
    }

    pub fn is_compensated(&self) -> bool {
        self.status == OrderStatus::Compensated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_compensate() {
        let mut order = Order::create(
            SagaId::new(),
            CustomerId::new(),
            ProductId::new("SKU-001"),
            2,
            Money::from_cents(4000),
            IdempotencyKey::new("key-1"),
        );
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(!order.is_compensated());

        order.compensate(Some(IdempotencyKey::new("comp-1")));
        assert!(order.is_compensated());
        assert_eq!(order.compensation_key.as_ref().unwrap().as_str(), "comp-1");

        // A second compensation keeps the original key.
        order.compensate(Some(IdempotencyKey::new("comp-2")));
        assert_eq!(order.compensation_key.as_ref().unwrap().as_str(), "comp-1");
    }
}
