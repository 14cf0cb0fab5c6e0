//! Participant services for the order-fulfillment saga.
//!
//! Each handler implements the same protocol skeleton:
//!
//! 1. Short-circuit on the `idempotency-key` (publisher retries land here).
//! 2. Load the saga log; reply `success:false` if it is missing.
//! 3. Perform the local domain action.
//! 4. Commit the participant row, the saga-log update, and the next outbox
//!    event in one transaction.
//!
//! Handlers never call another service directly; the outbox publisher is the
//! only egress.

pub mod config;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod order;
pub mod payment;
pub mod shipping;

pub use config::ProtocolConfig;
pub use error::ServiceError;
pub use gateway::{FixedGateway, PaymentDeclined, PaymentGateway, SimulatedGateway};
pub use inventory::InventoryHandler;
pub use order::OrderHandler;
pub use payment::PaymentHandler;
pub use shipping::ShippingHandler;
