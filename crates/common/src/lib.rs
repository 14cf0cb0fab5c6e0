//! Shared types for the order-fulfillment saga services.
//!
//! Every service speaks the same identifier vocabulary and wraps its HTTP
//! responses in the same envelope, so these types live in one leaf crate.

pub mod envelope;
pub mod ids;
pub mod money;

pub use envelope::ApiResponse;
pub use ids::{
    CustomerId, EventId, IdempotencyKey, OrderId, PaymentId, ProductId, SagaId, ShipmentId,
};
pub use money::Money;
