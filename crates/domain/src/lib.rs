//! Domain model for the orchestrated order-fulfillment saga.
//!
//! The saga runs as a linear chain across four services:
//!
//! ```text
//! CREATE_ORDER ──► PROCESS_PAYMENT ──► UPDATE_INVENTORY ──► DELIVER_ORDER
//! ```
//!
//! Each participant performs its local state change and appends the next
//! step's outbox event in the same transaction. On a step failure the chain
//! reverses through compensation events until the saga is COMPENSATED.

pub mod error;
pub mod inventory;
pub mod messages;
pub mod order;
pub mod outbox;
pub mod payment;
pub mod saga;
pub mod shipping;

pub use error::DomainError;
pub use inventory::{DEFAULT_INITIAL_STOCK, InventoryLevel};
pub use order::{Order, OrderStatus};
pub use outbox::{EventType, OutboxEvent, TargetService};
pub use payment::{Payment, PaymentStatus};
pub use saga::{CompensationStatus, SagaLog, SagaStatus, SagaStep, StepName, StepStatus};
pub use shipping::{Shipment, ShipmentStatus};
