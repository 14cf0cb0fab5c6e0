//! Storage layer for the saga services.
//!
//! The central contract lives in [`Storage::commit`]: a participant's state
//! change, its saga-log update, and any outbox appends are written in ONE
//! local transaction. The publisher can therefore never observe an outbox
//! event whose originating state change did not commit, and vice versa.

pub mod change;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use change::{ParticipantWrite, StateChange};
pub use error::{Result, StoreError};
pub use memory::InMemoryStorage;
pub use postgres::PostgresStorage;
pub use store::{
    InventoryStore, OrderStore, OutboxStore, PaymentStore, SagaLogStore, ShipmentStore, Storage,
};
