//! The saga log: durable record of saga progress.
//!
//! A `SagaLog` is written by the Order service at initiation and mutated in
//! place by every participant as its step advances. The `steps` sequence is
//! persisted as an ordered array so JSON key sorting can never reorder it.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, ProductId, SagaId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// The four saga steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepName {
    CreateOrder,
    ProcessPayment,
    UpdateInventory,
    DeliverOrder,
}

impl StepName {
    /// All steps in declared order.
    pub const ALL: [StepName; 4] = [
        StepName::CreateOrder,
        StepName::ProcessPayment,
        StepName::UpdateInventory,
        StepName::DeliverOrder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::CreateOrder => "CREATE_ORDER",
            StepName::ProcessPayment => "PROCESS_PAYMENT",
            StepName::UpdateInventory => "UPDATE_INVENTORY",
            StepName::DeliverOrder => "DELIVER_ORDER",
        }
    }

    /// Position of this step in the chain.
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Forward progress of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Compensated,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "PENDING",
            StepStatus::InProgress => "IN_PROGRESS",
            StepStatus::Completed => "COMPLETED",
            StepStatus::Failed => "FAILED",
            StepStatus::Compensated => "COMPENSATED",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Backward (compensation) progress of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompensationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Lifecycle of the saga as a whole.
///
/// ```text
/// STARTED ──► IN_PROGRESS ──┬──► COMPLETED
///     │                     ├──► COMPENSATING ──► COMPENSATED
///     └─────────────────────┴──► FAILED
/// ```
///
/// COMPLETED, COMPENSATED, and FAILED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    Started,
    InProgress,
    Completed,
    Failed,
    Compensating,
    Compensated,
}

impl SagaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Started => "STARTED",
            SagaStatus::InProgress => "IN_PROGRESS",
            SagaStatus::Completed => "COMPLETED",
            SagaStatus::Failed => "FAILED",
            SagaStatus::Compensating => "COMPENSATING",
            SagaStatus::Compensated => "COMPENSATED",
        }
    }

    /// Returns true once the saga can never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed | SagaStatus::Compensated | SagaStatus::Failed
        )
    }

    /// Monotonic transition check; self-transitions are allowed so replayed
    /// requests can re-save without error.
    pub fn can_transition_to(&self, next: SagaStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            SagaStatus::Started => matches!(
                next,
                SagaStatus::InProgress | SagaStatus::Compensating | SagaStatus::Failed
            ),
            SagaStatus::InProgress => matches!(
                next,
                SagaStatus::Completed | SagaStatus::Compensating | SagaStatus::Failed
            ),
            SagaStatus::Compensating => {
                matches!(next, SagaStatus::Compensated | SagaStatus::Failed)
            }
            SagaStatus::Completed | SagaStatus::Failed | SagaStatus::Compensated => false,
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SagaStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STARTED" => Ok(SagaStatus::Started),
            "IN_PROGRESS" => Ok(SagaStatus::InProgress),
            "COMPLETED" => Ok(SagaStatus::Completed),
            "FAILED" => Ok(SagaStatus::Failed),
            "COMPENSATING" => Ok(SagaStatus::Compensating),
            "COMPENSATED" => Ok(SagaStatus::Compensated),
            other => Err(DomainError::UnknownValue {
                what: "saga status",
                value: other.to_string(),
            }),
        }
    }
}

/// One entry in the saga's ordered step sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaStep {
    pub name: StepName,
    pub status: StepStatus,
    pub compensation_status: CompensationStatus,
    pub error: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl SagaStep {
    fn pending(name: StepName) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            compensation_status: CompensationStatus::Pending,
            error: None,
            timestamp: None,
        }
    }
}

/// Durable record of one saga: frozen business payload plus per-step
/// progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaLog {
    pub saga_id: SagaId,
    pub idempotency_key: Uuid,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub total_price: Money,
    pub order_id: Option<OrderId>,
    pub status: SagaStatus,
    pub steps: Vec<SagaStep>,
    pub created_at: DateTime<Utc>,
}

impl SagaLog {
    /// Creates a new saga in STARTED state with all four steps PENDING.
    pub fn start(
        idempotency_key: Uuid,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u32,
        total_price: Money,
    ) -> Self {
        Self {
            saga_id: SagaId::new(),
            idempotency_key,
            customer_id,
            product_id,
            quantity,
            total_price,
            order_id: None,
            status: SagaStatus::Started,
            steps: StepName::ALL.into_iter().map(SagaStep::pending).collect(),
            created_at: Utc::now(),
        }
    }

    /// Looks up a step record by name.
    pub fn step(&self, name: StepName) -> &SagaStep {
        // The constructor guarantees every name appears exactly once.
        self.steps
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| unreachable!("step {name} missing from saga log"))
    }

    fn step_mut(&mut self, name: StepName) -> &mut SagaStep {
        self.steps
            .iter_mut()
            .find(|s| s.name == name)
            .unwrap_or_else(|| unreachable!("step {name} missing from saga log"))
    }

    /// Marks a step IN_PROGRESS and stamps it.
    pub fn begin_step(&mut self, name: StepName) {
        let step = self.step_mut(name);
        step.status = StepStatus::InProgress;
        step.timestamp = Some(Utc::now());
    }

    /// Marks a step COMPLETED; all preceding steps must already be COMPLETED.
    pub fn complete_step(&mut self, name: StepName) -> Result<(), DomainError> {
        for prior in &StepName::ALL[..name.index()] {
            if self.step(*prior).status != StepStatus::Completed {
                return Err(DomainError::StepOutOfOrder {
                    step: name,
                    blocked_on: *prior,
                });
            }
        }
        let step = self.step_mut(name);
        step.status = StepStatus::Completed;
        step.error = None;
        step.timestamp = Some(Utc::now());
        Ok(())
    }

    /// Marks a step FAILED with the originating error.
    pub fn fail_step(&mut self, name: StepName, error: impl Into<String>) {
        let step = self.step_mut(name);
        step.status = StepStatus::Failed;
        step.error = Some(error.into());
        step.timestamp = Some(Utc::now());
    }

    /// Records a completed compensation for a step.
    pub fn compensate_step(&mut self, name: StepName) {
        let step = self.step_mut(name);
        if step.status == StepStatus::Completed {
            step.status = StepStatus::Compensated;
        }
        step.compensation_status = CompensationStatus::Completed;
        step.timestamp = Some(Utc::now());
    }

    /// Moves the saga status, enforcing monotonicity.
    pub fn transition(&mut self, next: SagaStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Terminal success: every step must be COMPLETED.
    pub fn mark_completed(&mut self) -> Result<(), DomainError> {
        if let Some(step) = self.steps.iter().find(|s| s.status != StepStatus::Completed) {
            return Err(DomainError::IncompleteStep {
                step: step.name,
                status: step.status,
            });
        }
        self.transition(SagaStatus::Completed)
    }

    /// Terminal failure: at least one step failed and every step that had
    /// completed has a completed compensation.
    pub fn mark_compensated(&mut self) -> Result<(), DomainError> {
        if !self.steps.iter().any(|s| s.status == StepStatus::Failed) {
            return Err(DomainError::CompensationIncomplete {
                reason: "no failed step".to_string(),
            });
        }
        if let Some(step) = self.steps.iter().find(|s| {
            s.status == StepStatus::Compensated
                && s.compensation_status != CompensationStatus::Completed
        }) {
            return Err(DomainError::CompensationIncomplete {
                reason: format!("step {} not compensated", step.name),
            });
        }
        self.transition(SagaStatus::Compensated)
    }

    /// True when every step completed.
    pub fn all_steps_completed(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }
}
