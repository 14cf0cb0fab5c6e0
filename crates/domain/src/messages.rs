//! Wire DTOs for the saga HTTP surface.
//!
//! These shapes double as request bodies on the inbound side and as outbox
//! event payloads on the outbound side: the event a participant appends is
//! exactly the body the next participant's endpoint expects. All fields are
//! camelCase on the wire.

use common::{CustomerId, Money, OrderId, PaymentId, ProductId, SagaId, ShipmentId};
use serde::{Deserialize, Serialize};

use crate::inventory::InventoryLevel;
use crate::order::Order;
use crate::payment::Payment;
use crate::shipping::Shipment;

// -- Order service --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOrderRequest {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub total_price: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOrderData {
    pub order_id: OrderId,
    pub saga_log_id: SagaId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensateOrderRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    pub order_id: OrderId,
    pub saga_log_id: SagaId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub total_price: Money,
    pub status: String,
}

impl From<&Order> for OrderData {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            saga_log_id: order.saga_id,
            customer_id: order.customer_id,
            product_id: order.product_id.clone(),
            quantity: order.quantity,
            total_price: order.total_price,
            status: order.status.to_string(),
        }
    }
}

// -- Payment service --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    pub amount: Money,
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub saga_log_id: SagaId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundPaymentRequest {
    pub order_id: OrderId,
    pub saga_log_id: SagaId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentData {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub status: String,
}

impl From<&Payment> for PaymentData {
    fn from(payment: &Payment) -> Self {
        Self {
            payment_id: payment.id,
            order_id: payment.order_id,
            amount: payment.amount,
            status: payment.status.to_string(),
        }
    }
}

// -- Inventory service --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInventoryRequest {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub saga_log_id: SagaId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensateInventoryRequest {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub saga_log_id: SagaId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeInventoryRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryData {
    pub product_id: ProductId,
    pub quantity: u32,
    pub reserved_quantity: u32,
}

impl From<&InventoryLevel> for InventoryData {
    fn from(level: &InventoryLevel) -> Self {
        Self {
            product_id: level.product_id.clone(),
            quantity: level.quantity,
            reserved_quantity: level.reserved_quantity,
        }
    }
}

// -- Shipping service --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverOrderRequest {
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub saga_log_id: SagaId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelShipmentRequest {
    pub order_id: OrderId,
    pub saga_log_id: SagaId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentData {
    pub shipping_id: ShipmentId,
    pub order_id: OrderId,
    pub status: String,
}

impl From<&Shipment> for ShipmentData {
    fn from(shipment: &Shipment) -> Self {
        Self {
            shipping_id: shipment.id,
            order_id: shipment.order_id,
            status: shipment.status.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_camel_case() {
        let req = StartOrderRequest {
            customer_id: CustomerId::new(),
            product_id: ProductId::new("SKU-001"),
            quantity: 2,
            total_price: Money::from_cents(4000),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("customerId").is_some());
        assert!(json.get("productId").is_some());
        assert!(json.get("totalPrice").is_some());
        assert!(json.get("customer_id").is_none());
    }

    #[test]
    fn payment_request_parses_spec_body() {
        let json = serde_json::json!({
            "amount": 4000,
            "customerId": uuid::Uuid::new_v4(),
            "orderId": uuid::Uuid::new_v4(),
            "sagaLogId": uuid::Uuid::new_v4(),
        });
        let req: ProcessPaymentRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.amount, Money::from_cents(4000));
    }

    #[test]
    fn start_data_shape() {
        let data = StartOrderData {
            order_id: OrderId::new(),
            saga_log_id: SagaId::new(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("orderId").is_some());
        assert!(json.get("sagaLogId").is_some());
    }
}
