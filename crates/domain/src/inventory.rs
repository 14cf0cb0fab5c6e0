//! Inventory participant record.

use chrono::{DateTime, Utc};
use common::{IdempotencyKey, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Stock level auto-created for a product seen for the first time.
pub const DEFAULT_INITIAL_STOCK: u32 = 100;

/// Stock tracking for one product.
///
/// `quantity` is the on-hand count; `reserved_quantity` tracks units held
/// for in-flight orders. Availability is `quantity - reserved_quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub product_id: ProductId,
    pub quantity: u32,
    pub reserved_quantity: u32,
    pub idempotency_key: Option<IdempotencyKey>,
    pub compensation_key: Option<IdempotencyKey>,
    pub created_at: DateTime<Utc>,
}

impl InventoryLevel {
    pub fn with_stock(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            reserved_quantity: 0,
            idempotency_key: None,
            compensation_key: None,
            created_at: Utc::now(),
        }
    }

    /// Units not yet reserved.
    pub fn available(&self) -> u32 {
        self.quantity.saturating_sub(self.reserved_quantity)
    }

    /// Reserves stock for an order: decrements on-hand, increments reserved.
    pub fn reserve(&mut self, requested: u32) -> Result<(), DomainError> {
        let available = self.available();
        if available < requested {
            return Err(DomainError::InsufficientInventory {
                product: self.product_id.clone(),
                requested,
                available,
            });
        }
        self.quantity -= requested;
        self.reserved_quantity += requested;
        Ok(())
    }

    /// Compensating restore: returns stock and releases the reservation.
    pub fn restore(&mut self, quantity: u32) {
        self.quantity += quantity;
        self.reserved_quantity = self.reserved_quantity.saturating_sub(quantity);
    }
}
