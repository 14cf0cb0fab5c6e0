//! Payment gateway seam.
//!
//! The decline rate is a demo artifact, so it is injectable rather than
//! hard-coded: production deployments plug in a real gateway, tests plug in
//! [`FixedGateway`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{CustomerId, Money, OrderId};
use rand::Rng;
use thiserror::Error;

/// A business-level decline. Transport failures never surface here: the
/// simulated gateway is local, and a real gateway adapter would map
/// transport errors to its own retry policy before reaching the saga.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct PaymentDeclined {
    pub reason: String,
}

impl PaymentDeclined {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Authorizes charges for the payment step.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(
        &self,
        order_id: OrderId,
        customer_id: CustomerId,
        amount: Money,
    ) -> Result<(), PaymentDeclined>;
}

/// Gateway simulation with a configurable random decline rate.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    failure_rate: f64,
}

impl SimulatedGateway {
    pub fn new(failure_rate: f64) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn authorize(
        &self,
        _order_id: OrderId,
        _customer_id: CustomerId,
        amount: Money,
    ) -> Result<(), PaymentDeclined> {
        if !amount.is_positive() {
            return Err(PaymentDeclined::new("Amount must be positive"));
        }
        if rand::thread_rng().r#gen::<f64>() < self.failure_rate {
            return Err(PaymentDeclined::new("Payment declined"));
        }
        Ok(())
    }
}

/// Deterministic gateway for tests: approves until told to decline.
#[derive(Debug, Clone, Default)]
pub struct FixedGateway {
    decline: Arc<AtomicBool>,
}

impl FixedGateway {
    pub fn approving() -> Self {
        Self::default()
    }

    pub fn set_decline(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for FixedGateway {
    async fn authorize(
        &self,
        _order_id: OrderId,
        _customer_id: CustomerId,
        _amount: Money,
    ) -> Result<(), PaymentDeclined> {
        if self.decline.load(Ordering::SeqCst) {
            return Err(PaymentDeclined::new("Payment declined"));
        }
        Ok(())
    }
}
