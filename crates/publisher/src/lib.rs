//! Transactional-outbox publisher.
//!
//! One publisher task runs inside each service process. It polls that
//! service's outbox for unpublished events and relays them over HTTP with a
//! deterministic `idempotency-key` header, so delivery is at-least-once and
//! receivers dedupe replays.

pub mod config;
pub mod publisher;

pub use config::{PublisherConfig, ServiceUrls};
pub use publisher::{DISPATCH_CONCURRENCY, OutboxPublisher};
