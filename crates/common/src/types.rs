use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace UUID used to derive aggregate IDs from order numbers.
const ORDER_NAMESPACE: Uuid = Uuid::from_bytes([
    0x5b, 0x1e, 0x9a, 0x47, 0xc2, 0x30, 0x4d, 0x8f, 0x91, 0x6a, 0x3d, 0x02, 0x7e, 0x54, 0xb8, 0x19,
]);

/// Unique identifier for an aggregate instance.
///
/// Wraps a UUID to provide type safety and prevent mixing up
/// aggregate IDs with other UUID-based identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Creates a new random aggregate ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derives the aggregate ID for a fulfillment order from its order number.
    ///
    /// The derivation is deterministic (UUID v5), so re-delivery of the same
    /// intake maps to the same aggregate and cannot create a duplicate order.
    pub fn for_order(order_number: &OrderNumber) -> Self {
        Self(Uuid::new_v5(
            &ORDER_NAMESPACE,
            order_number.as_str().as_bytes(),
        ))
    }

    /// Creates an aggregate ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateId> for Uuid {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}

/// Human-facing order number assigned by checkout.
///
/// Immutable once assigned; used for idempotent intake and as the
/// reference customers see in notifications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Creates an order number from a string.
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Returns the order number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the order number is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a fulfillment item within its order.
///
/// Assigned sequentially from the line position at intake; stable for
/// the life of the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u32);

impl ItemId {
    /// Creates an item ID from a raw index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ItemId {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_id_new_creates_unique_ids() {
        let id1 = AggregateId::new();
        let id2 = AggregateId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn aggregate_id_for_order_is_deterministic() {
        let number = OrderNumber::new("SO-2026-00042");
        let id1 = AggregateId::for_order(&number);
        let id2 = AggregateId::for_order(&number);
        assert_eq!(id1, id2);
    }

    #[test]
    fn aggregate_id_for_order_differs_per_order() {
        let a = AggregateId::for_order(&OrderNumber::new("SO-2026-00042"));
        let b = AggregateId::for_order(&OrderNumber::new("SO-2026-00043"));
        assert_ne!(a, b);
    }

    #[test]
    fn aggregate_id_serialization_roundtrip() {
        let id = AggregateId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: AggregateId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn order_number_display_and_as_str() {
        let number = OrderNumber::new("SO-1");
        assert_eq!(number.to_string(), "SO-1");
        assert_eq!(number.as_str(), "SO-1");
        assert!(!number.is_empty());
        assert!(OrderNumber::new("").is_empty());
    }

    #[test]
    fn item_id_ordering_follows_line_position() {
        assert!(ItemId::new(0) < ItemId::new(1));
        assert_eq!(ItemId::new(3).as_u32(), 3);
    }
}
