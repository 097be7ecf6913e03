//! Value objects for the fulfillment domain.

use common::ItemId;
use serde::{Deserialize, Serialize};

/// Classification of a fulfillment item, fixed at intake from catalog
/// metadata. Selects the connector the item is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Digital course access, delivered synchronously.
    DigitalCourse,

    /// Subscription entitlement, delivered synchronously.
    Subscription,

    /// Print-on-demand item produced by Printling.
    PodPrintling,

    /// Print-on-demand item produced by Nordica (quotes in EUR).
    PodNordica,

    /// Dropshipped item forwarded to a third-party source catalog.
    Dropship,

    /// Item shipped manually from owned inventory.
    OwnedInventory,
}

impl ItemKind {
    /// Parses the kind hint carried on the intake payload.
    pub fn from_hint(hint: &str) -> Option<Self> {
        match hint {
            "digital-course" => Some(ItemKind::DigitalCourse),
            "subscription" => Some(ItemKind::Subscription),
            "pod-printling" => Some(ItemKind::PodPrintling),
            "pod-nordica" => Some(ItemKind::PodNordica),
            "dropship" => Some(ItemKind::Dropship),
            "owned-inventory" => Some(ItemKind::OwnedInventory),
            _ => None,
        }
    }

    /// Returns true for kinds that deliver synchronously with no shipping.
    pub fn is_digital(&self) -> bool {
        matches!(self, ItemKind::DigitalCourse | ItemKind::Subscription)
    }

    /// The supplier this kind routes to, if any.
    pub fn supplier(&self) -> Option<SupplierName> {
        match self {
            ItemKind::DigitalCourse | ItemKind::Subscription => Some(SupplierName::DigitalDelivery),
            ItemKind::PodPrintling => Some(SupplierName::Printling),
            ItemKind::PodNordica => Some(SupplierName::Nordica),
            ItemKind::Dropship => Some(SupplierName::Dropship),
            ItemKind::OwnedInventory => None,
        }
    }

    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::DigitalCourse => "digital-course",
            ItemKind::Subscription => "subscription",
            ItemKind::PodPrintling => "pod-printling",
            ItemKind::PodNordica => "pod-nordica",
            ItemKind::Dropship => "dropship",
            ItemKind::OwnedInventory => "owned-inventory",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The external integrations the core talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupplierName {
    Printling,
    Nordica,
    Dropship,
    DigitalDelivery,
}

impl SupplierName {
    /// Returns the supplier name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplierName::Printling => "printling",
            SupplierName::Nordica => "nordica",
            SupplierName::Dropship => "dropship",
            SupplierName::DigitalDelivery => "digital-delivery",
        }
    }

    /// Parses a supplier name from its string form.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "printling" => Some(SupplierName::Printling),
            "nordica" => Some(SupplierName::Nordica),
            "dropship" => Some(SupplierName::Dropship),
            "digital-delivery" => Some(SupplierName::DigitalDelivery),
            _ => None,
        }
    }
}

impl std::fmt::Display for SupplierName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Destination address for physical items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
}

/// Internal shipping service level chosen at checkout.
///
/// Each POD connector maps this onto its supplier's shipping-method enum;
/// a preference the supplier cannot satisfy is a rejection, not a silent
/// downgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShippingPreference {
    #[default]
    Standard,
    Expedited,
    Overnight,
}

impl ShippingPreference {
    /// Returns the preference name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingPreference::Standard => "standard",
            ShippingPreference::Expedited => "expedited",
            ShippingPreference::Overnight => "overnight",
        }
    }
}

impl std::fmt::Display for ShippingPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized tracking data reported by a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TrackingInfo {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
}

impl TrackingInfo {
    /// Returns true if no tracking fields are populated.
    pub fn is_empty(&self) -> bool {
        self.carrier.is_none() && self.tracking_number.is_none() && self.tracking_url.is_none()
    }

    /// Overlays populated fields of `other` onto this tracking info.
    pub fn merge(&mut self, other: &TrackingInfo) {
        if other.carrier.is_some() {
            self.carrier = other.carrier.clone();
        }
        if other.tracking_number.is_some() {
            self.tracking_number = other.tracking_number.clone();
        }
        if other.tracking_url.is_some() {
            self.tracking_url = other.tracking_url.clone();
        }
    }
}

/// Audit record of a supplier charge, including the currency conversion
/// performed once at submission time. Never recomputed on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierCharge {
    /// Amount quoted by the supplier, in minor units of its currency.
    pub quoted_cents: i64,

    /// ISO 4217 code of the supplier's quote currency.
    pub quoted_currency: Currency,

    /// Conversion rate to the settlement currency, in micro-units
    /// (1_000_000 == 1.0).
    pub rate_micros: i64,

    /// Settled amount in USD cents after conversion.
    pub settled_cents: i64,
}

impl SupplierCharge {
    /// Records a charge settled in the quote currency itself.
    pub fn native(quoted_cents: i64, currency: Currency) -> Self {
        Self {
            quoted_cents,
            quoted_currency: currency,
            rate_micros: 1_000_000,
            settled_cents: quoted_cents,
        }
    }

    /// Converts a foreign-currency quote at the given rate.
    ///
    /// Integer arithmetic, rounding toward zero; the rate is captured in
    /// the record so the settlement is auditable later.
    pub fn converted(quoted_cents: i64, currency: Currency, rate_micros: i64) -> Self {
        Self {
            quoted_cents,
            quoted_currency: currency,
            rate_micros,
            settled_cents: quoted_cents * rate_micros / 1_000_000,
        }
    }
}

/// Currencies suppliers quote in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Usd,
    Eur,
}

impl Currency {
    /// Returns the ISO 4217 code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The customer the order is fulfilled for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    /// Identifier of the customer in the platform's user store.
    pub customer_id: String,

    /// Address transactional notifications are sent to.
    pub email: String,

    /// Display name used in notifications.
    pub name: String,
}

/// What a digital delivery grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryType {
    CourseAccess,
    Subscription,
    Download,
}

impl DeliveryType {
    /// Returns the delivery type as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::CourseAccess => "course-access",
            DeliveryType::Subscription => "subscription",
            DeliveryType::Download => "download",
        }
    }
}

/// Transactional message templates the emitter can send.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum NotificationKind {
    OrderConfirmed,
    CourseAccess,
    SubscriptionActivated,
    ItemFulfilled,
    ItemShipped,
    ItemDelivered,
    ItemFailed,
    OrderFailed,
}

impl NotificationKind {
    /// The template type sent to the email transport.
    pub fn template(&self) -> &'static str {
        match self {
            NotificationKind::OrderConfirmed => "order_confirmed",
            NotificationKind::CourseAccess => "course_access",
            NotificationKind::SubscriptionActivated => "subscription_activated",
            NotificationKind::ItemFulfilled => "item_fulfilled",
            NotificationKind::ItemShipped => "order_shipped",
            NotificationKind::ItemDelivered => "order_delivered",
            NotificationKind::ItemFailed => "item_failed",
            NotificationKind::OrderFailed => "order_failed",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.template())
    }
}

/// Key under which a sent notification is recorded for idempotent
/// suppression: one send per (kind, item) transition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NotificationKey {
    pub kind: NotificationKind,
    pub item: Option<ItemId>,
}

impl NotificationKey {
    /// Key for an order-level notification.
    pub fn order(kind: NotificationKind) -> Self {
        Self { kind, item: None }
    }

    /// Key for an item-level notification.
    pub fn item(kind: NotificationKind, item_id: ItemId) -> Self {
        Self {
            kind,
            item: Some(item_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_hint_parsing() {
        assert_eq!(
            ItemKind::from_hint("digital-course"),
            Some(ItemKind::DigitalCourse)
        );
        assert_eq!(ItemKind::from_hint("pod-nordica"), Some(ItemKind::PodNordica));
        assert_eq!(ItemKind::from_hint("mystery-box"), None);
    }

    #[test]
    fn test_digital_kinds() {
        assert!(ItemKind::DigitalCourse.is_digital());
        assert!(ItemKind::Subscription.is_digital());
        assert!(!ItemKind::PodPrintling.is_digital());
        assert!(!ItemKind::OwnedInventory.is_digital());
    }

    #[test]
    fn test_kind_routes_to_supplier() {
        assert_eq!(
            ItemKind::DigitalCourse.supplier(),
            Some(SupplierName::DigitalDelivery)
        );
        assert_eq!(ItemKind::PodPrintling.supplier(), Some(SupplierName::Printling));
        assert_eq!(ItemKind::OwnedInventory.supplier(), None);
    }

    #[test]
    fn test_supplier_name_roundtrip() {
        for name in [
            SupplierName::Printling,
            SupplierName::Nordica,
            SupplierName::Dropship,
            SupplierName::DigitalDelivery,
        ] {
            assert_eq!(SupplierName::parse(name.as_str()), Some(name));
        }
        assert_eq!(SupplierName::parse("acme"), None);
    }

    #[test]
    fn test_tracking_merge_keeps_existing_fields() {
        let mut tracking = TrackingInfo {
            carrier: Some("UPS".to_string()),
            tracking_number: Some("TRK123".to_string()),
            tracking_url: None,
        };
        tracking.merge(&TrackingInfo {
            carrier: None,
            tracking_number: None,
            tracking_url: Some("https://track.example/TRK123".to_string()),
        });

        assert_eq!(tracking.carrier.as_deref(), Some("UPS"));
        assert_eq!(tracking.tracking_number.as_deref(), Some("TRK123"));
        assert_eq!(
            tracking.tracking_url.as_deref(),
            Some("https://track.example/TRK123")
        );
    }

    #[test]
    fn test_native_charge_keeps_amount() {
        let charge = SupplierCharge::native(1250, Currency::Usd);
        assert_eq!(charge.settled_cents, 1250);
        assert_eq!(charge.rate_micros, 1_000_000);
    }

    #[test]
    fn test_converted_charge_applies_rate() {
        // 20.00 EUR at 1.08 USD/EUR == 21.60 USD
        let charge = SupplierCharge::converted(2000, Currency::Eur, 1_080_000);
        assert_eq!(charge.settled_cents, 2160);
        assert_eq!(charge.quoted_cents, 2000);
        assert_eq!(charge.quoted_currency, Currency::Eur);
    }

    #[test]
    fn test_notification_templates() {
        assert_eq!(NotificationKind::ItemShipped.template(), "order_shipped");
        assert_eq!(NotificationKind::CourseAccess.template(), "course_access");
    }

    #[test]
    fn test_notification_keys_distinguish_items() {
        use common::ItemId;
        let a = NotificationKey::item(NotificationKind::ItemShipped, ItemId::new(0));
        let b = NotificationKey::item(NotificationKind::ItemShipped, ItemId::new(1));
        assert_ne!(a, b);
        assert_ne!(a, NotificationKey::order(NotificationKind::ItemShipped));
    }
}
