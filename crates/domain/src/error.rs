//! Domain error types.

use common::ProductId;
use thiserror::Error;

use crate::outbox::EventType;
use crate::saga::{SagaStatus, StepName};

/// Errors raised by domain state machines.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A step may only complete once all preceding steps have completed.
    #[error("Step {step} cannot complete: predecessor {blocked_on} is not completed")]
    StepOutOfOrder { step: StepName, blocked_on: StepName },

    /// Saga statuses move monotonically toward a terminal state.
    #[error("Invalid saga status transition: {from} -> {to}")]
    InvalidTransition { from: SagaStatus, to: SagaStatus },

    /// A saga may only be marked COMPLETED when every step completed.
    #[error("Saga cannot complete: step {step} is {status}")]
    IncompleteStep {
        step: StepName,
        status: crate::saga::StepStatus,
    },

    /// A saga may only be marked COMPENSATED after a failure, with every
    /// completed step compensated.
    #[error("Saga cannot be marked compensated: {reason}")]
    CompensationIncomplete { reason: String },

    /// Reservation request exceeds available stock.
    #[error("Insufficient inventory for {product}: requested {requested}, available {available}")]
    InsufficientInventory {
        product: ProductId,
        requested: u32,
        available: u32,
    },

    /// The event type has no forward route (terminal events are never
    /// enqueued).
    #[error("Event type {0} has no outbox route")]
    UnroutableEvent(EventType),

    /// A persisted enum literal no longer matches the closed set.
    #[error("Unknown {what} value: {value}")]
    UnknownValue { what: &'static str, value: String },
}
