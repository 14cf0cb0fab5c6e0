use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// All generated identifiers are UUID v7 so that primary-key order follows
/// insertion order, which the outbox scan relies on.
macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new time-ordered identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id! {
    /// Identifier of a saga log entry.
    SagaId
}

uuid_id! {
    /// Identifier of an order row.
    OrderId
}

uuid_id! {
    /// Identifier of a payment row.
    PaymentId
}

uuid_id! {
    /// Identifier of a shipment row.
    ShipmentId
}

uuid_id! {
    /// Identifier of a customer.
    CustomerId
}

uuid_id! {
    /// Identifier of an outbox event row.
    EventId
}

/// Product identifier (an opaque SKU, not a UUID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(sku: impl Into<String>) -> Self {
        Self(sku.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductId {
    fn from(sku: &str) -> Self {
        Self(sku.to_string())
    }
}

/// Caller-supplied deduplication key.
///
/// Keys arriving at `/order/start` are client UUIDs; keys computed by the
/// outbox publisher are `"{aggregateId}-{eventType}"` strings. Both are
/// treated as opaque text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the key as a UUID, when one is required (saga initiation).
    pub fn as_uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.0).ok()
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IdempotencyKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<Uuid> for IdempotencyKey {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(SagaId::new(), SagaId::new());
        assert_ne!(OrderId::new(), OrderId::new());
    }

    #[test]
    fn generated_ids_are_time_ordered() {
        // v7 identifiers embed a millisecond timestamp in the high bits.
        // Ordering within one millisecond is random, so compare across a
        // measurable gap.
        let earlier = EventId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let later = EventId::new();
        assert!(earlier.as_uuid() < later.as_uuid());
    }

    #[test]
    fn from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        assert_eq!(OrderId::from_uuid(uuid).as_uuid(), uuid);
    }

    #[test]
    fn id_serialization_roundtrip() {
        let id = SagaId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: SagaId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn idempotency_key_uuid_parsing() {
        let uuid = Uuid::new_v4();
        let key = IdempotencyKey::from(uuid);
        assert_eq!(key.as_uuid(), Some(uuid));

        let computed = IdempotencyKey::new("0198a7e1-OrderCreated");
        assert_eq!(computed.as_uuid(), None);
    }

    #[test]
    fn product_id_is_plain_text() {
        let sku = ProductId::new("SKU-001");
        assert_eq!(sku.as_str(), "SKU-001");
        assert_eq!(sku.to_string(), "SKU-001");
    }
}
