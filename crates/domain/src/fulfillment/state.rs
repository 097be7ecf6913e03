//! Item and order state machines.

use serde::{Deserialize, Serialize};

/// The state of a single fulfillment item.
///
/// State transitions:
/// ```text
/// Queued ──► Submitting ──┬──► Fulfilled
///    ▲            │       ├──► PendingSupplier ──► Shipped ──► Delivered
///    └────────────┤       │            │              │
///     (transient) │       │            ├──────────────┴──► Cancelled
///                 │       │            └──► Delivered
///                 └───────┴──► Failed ◄── (retry ceiling / rejection)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ItemStatus {
    /// Item is waiting for a submission attempt (initial state, also the
    /// state an item returns to after a transient supplier failure).
    #[default]
    Queued,

    /// A submission attempt against the item's connector is in flight.
    Submitting,

    /// The supplier accepted the order; awaiting asynchronous status pushes.
    PendingSupplier,

    /// Delivered value with no physical shipping (terminal state).
    Fulfilled,

    /// The supplier handed the parcel to a carrier.
    Shipped,

    /// The carrier confirmed delivery (terminal state).
    Delivered,

    /// Rejected, or retry ceiling exhausted (terminal state).
    Failed,

    /// Cancelled before delivery (terminal state).
    Cancelled,
}

impl ItemStatus {
    /// Returns true if a submission attempt can start in this state.
    pub fn can_submit(&self) -> bool {
        matches!(self, ItemStatus::Queued)
    }

    /// Returns true if a submission outcome can be recorded in this state.
    pub fn can_record_outcome(&self) -> bool {
        matches!(self, ItemStatus::Submitting)
    }

    /// Returns true if the item can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this is a terminal state (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemStatus::Fulfilled
                | ItemStatus::Delivered
                | ItemStatus::Failed
                | ItemStatus::Cancelled
        )
    }

    /// Returns true if this is a terminal success state.
    pub fn is_terminal_success(&self) -> bool {
        matches!(self, ItemStatus::Fulfilled | ItemStatus::Delivered)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::Submitting => "submitting",
            ItemStatus::PendingSupplier => "pending-supplier",
            ItemStatus::Fulfilled => "fulfilled",
            ItemStatus::Shipped => "shipped",
            ItemStatus::Delivered => "delivered",
            ItemStatus::Failed => "failed",
            ItemStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The order-level status, always derived from item statuses.
///
/// This is never stored as independently writable state; it is recomputed
/// on every item transition, which eliminates drift between order and item
/// truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// At least one item is still in flight and none has succeeded yet.
    #[default]
    Processing,

    /// At least one item reached terminal success while another has not.
    PartiallyFulfilled,

    /// Every item reached terminal success.
    Fulfilled,

    /// Every item failed or was cancelled.
    Failed,
}

impl OrderStatus {
    /// Derives the order status from the statuses of its items.
    pub fn derive<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = ItemStatus>,
    {
        let mut any = false;
        let mut all_success = true;
        let mut all_failed = true;
        let mut any_success = false;

        for status in statuses {
            any = true;
            let success = status.is_terminal_success();
            let failed = matches!(status, ItemStatus::Failed | ItemStatus::Cancelled);
            all_success &= success;
            all_failed &= failed;
            any_success |= success;
        }

        if !any {
            return OrderStatus::Processing;
        }
        if all_success {
            return OrderStatus::Fulfilled;
        }
        if all_failed {
            return OrderStatus::Failed;
        }
        if any_success {
            return OrderStatus::PartiallyFulfilled;
        }
        OrderStatus::Processing
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::PartiallyFulfilled => "partially-fulfilled",
            OrderStatus::Fulfilled => "fulfilled",
            OrderStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of an order placed with an external supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SupplierOrderStatus {
    /// Submission sent; the supplier has not assigned an order ID yet.
    #[default]
    Submitted,

    /// The supplier accepted the submission.
    Accepted,

    /// The supplier reported the item in production.
    InProduction,

    /// The supplier handed the parcel to a carrier.
    Shipped,

    /// The carrier confirmed delivery (terminal).
    Delivered,

    /// Cancelled before delivery (terminal).
    Cancelled,
}

impl SupplierOrderStatus {
    /// Monotonic rank used by the reconciler: a webhook reporting a status
    /// at or below the recorded rank never regresses state.
    pub fn rank(&self) -> u8 {
        match self {
            SupplierOrderStatus::Submitted => 0,
            SupplierOrderStatus::Accepted => 1,
            SupplierOrderStatus::InProduction => 2,
            SupplierOrderStatus::Shipped => 3,
            SupplierOrderStatus::Delivered => 4,
            // Cancellation is handled out of band of the rank ordering.
            SupplierOrderStatus::Cancelled => 5,
        }
    }

    /// Returns true if no further supplier statuses are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SupplierOrderStatus::Delivered | SupplierOrderStatus::Cancelled
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplierOrderStatus::Submitted => "submitted",
            SupplierOrderStatus::Accepted => "accepted",
            SupplierOrderStatus::InProduction => "in-production",
            SupplierOrderStatus::Shipped => "shipped",
            SupplierOrderStatus::Delivered => "delivered",
            SupplierOrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SupplierOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Supplier status vocabulary shared by all connectors.
///
/// Each connector maps its supplier's raw status strings into this enum;
/// the aggregate applies them monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NormalizedSupplierStatus {
    Accepted,
    InProduction,
    Shipped,
    Delivered,
    Cancelled,
}

impl NormalizedSupplierStatus {
    /// The supplier-order status this normalized status maps to.
    pub fn as_supplier_status(&self) -> SupplierOrderStatus {
        match self {
            NormalizedSupplierStatus::Accepted => SupplierOrderStatus::Accepted,
            NormalizedSupplierStatus::InProduction => SupplierOrderStatus::InProduction,
            NormalizedSupplierStatus::Shipped => SupplierOrderStatus::Shipped,
            NormalizedSupplierStatus::Delivered => SupplierOrderStatus::Delivered,
            NormalizedSupplierStatus::Cancelled => SupplierOrderStatus::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ItemStatus::*;

    #[test]
    fn test_default_item_status_is_queued() {
        assert_eq!(ItemStatus::default(), Queued);
    }

    #[test]
    fn test_only_queued_can_submit() {
        assert!(Queued.can_submit());
        for status in [
            Submitting,
            PendingSupplier,
            Fulfilled,
            Shipped,
            Delivered,
            Failed,
            Cancelled,
        ] {
            assert!(!status.can_submit(), "{status} should not submit");
        }
    }

    #[test]
    fn test_outcome_only_recordable_while_submitting() {
        assert!(Submitting.can_record_outcome());
        assert!(!Queued.can_record_outcome());
        assert!(!PendingSupplier.can_record_outcome());
    }

    #[test]
    fn test_terminal_states() {
        for status in [Fulfilled, Delivered, Failed, Cancelled] {
            assert!(status.is_terminal(), "{status} should be terminal");
        }
        for status in [Queued, Submitting, PendingSupplier, Shipped] {
            assert!(!status.is_terminal(), "{status} should not be terminal");
        }
    }

    #[test]
    fn test_terminal_success() {
        assert!(Fulfilled.is_terminal_success());
        assert!(Delivered.is_terminal_success());
        assert!(!Shipped.is_terminal_success());
        assert!(!Failed.is_terminal_success());
    }

    // Exhaustive table for the aggregate derivation rule.
    #[test]
    fn test_derive_all_success_is_fulfilled() {
        assert_eq!(
            OrderStatus::derive([Fulfilled, Delivered]),
            OrderStatus::Fulfilled
        );
        assert_eq!(OrderStatus::derive([Fulfilled]), OrderStatus::Fulfilled);
    }

    #[test]
    fn test_derive_all_failed_is_failed() {
        assert_eq!(OrderStatus::derive([Failed, Cancelled]), OrderStatus::Failed);
        assert_eq!(OrderStatus::derive([Cancelled]), OrderStatus::Failed);
    }

    #[test]
    fn test_derive_mixed_success_is_partially_fulfilled() {
        assert_eq!(
            OrderStatus::derive([Fulfilled, Failed]),
            OrderStatus::PartiallyFulfilled
        );
        assert_eq!(
            OrderStatus::derive([Delivered, Queued]),
            OrderStatus::PartiallyFulfilled
        );
        assert_eq!(
            OrderStatus::derive([Fulfilled, PendingSupplier, Cancelled]),
            OrderStatus::PartiallyFulfilled
        );
    }

    #[test]
    fn test_derive_no_success_yet_is_processing() {
        assert_eq!(OrderStatus::derive([Queued, Queued]), OrderStatus::Processing);
        assert_eq!(
            OrderStatus::derive([PendingSupplier, Failed]),
            OrderStatus::Processing
        );
        assert_eq!(OrderStatus::derive([Shipped]), OrderStatus::Processing);
        assert_eq!(OrderStatus::derive([]), OrderStatus::Processing);
    }

    #[test]
    fn test_supplier_status_rank_is_monotone() {
        use SupplierOrderStatus::*;
        assert!(Submitted.rank() < Accepted.rank());
        assert!(Accepted.rank() < InProduction.rank());
        assert!(InProduction.rank() < Shipped.rank());
        assert!(Shipped.rank() < Delivered.rank());
    }

    #[test]
    fn test_normalized_status_mapping() {
        assert_eq!(
            NormalizedSupplierStatus::Shipped.as_supplier_status(),
            SupplierOrderStatus::Shipped
        );
        assert_eq!(
            NormalizedSupplierStatus::Cancelled.as_supplier_status(),
            SupplierOrderStatus::Cancelled
        );
    }

    #[test]
    fn test_display_uses_kebab_case() {
        assert_eq!(PendingSupplier.to_string(), "pending-supplier");
        assert_eq!(
            OrderStatus::PartiallyFulfilled.to_string(),
            "partially-fulfilled"
        );
        assert_eq!(SupplierOrderStatus::InProduction.to_string(), "in-production");
    }

    #[test]
    fn test_serialization_roundtrip() {
        let status = ItemStatus::PendingSupplier;
        let json = serde_json::to_string(&status).unwrap();
        let deserialized: ItemStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, deserialized);
    }
}
