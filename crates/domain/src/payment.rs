//! Payment participant record.

use chrono::{DateTime, Utc};
use common::{CustomerId, IdempotencyKey, Money, OrderId, PaymentId, SagaId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Completed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(DomainError::UnknownValue {
                what: "payment status",
                value: other.to_string(),
            }),
        }
    }
}

/// A captured payment, created on the first successful charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub saga_id: SagaId,
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub amount: Money,
    pub status: PaymentStatus,
    pub idempotency_key: IdempotencyKey,
    pub compensation_key: Option<IdempotencyKey>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn capture(
        saga_id: SagaId,
        order_id: OrderId,
        customer_id: CustomerId,
        amount: Money,
        idempotency_key: IdempotencyKey,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            saga_id,
            order_id,
            customer_id,
            amount,
            status: PaymentStatus::Completed,
            idempotency_key,
            compensation_key: None,
            created_at: Utc::now(),
        }
    }

    pub fn refund(&mut self, compensation_key: IdempotencyKey) {
        self.status = PaymentStatus::Refunded;
        if self.compensation_key.is_none() {
            self.compensation_key = Some(compensation_key);
        }
    }

    pub fn is_refunded(&self) -> bool {
        self.status == PaymentStatus::Refunded
    }
}
