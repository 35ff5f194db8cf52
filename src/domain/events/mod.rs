//! Domain events
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Cart(CartEvent),
    Coupon(CouponEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    ItemAdded { cart_id: Uuid, item_id: Uuid, product_id: Uuid, quantity: u32 },
    QuantityUpdated { cart_id: Uuid, item_id: Uuid, quantity: u32 },
    ItemRemoved { cart_id: Uuid, item_id: Uuid },
    Cleared { cart_id: Uuid },
    Repaired { cart_id: Uuid, dropped: Vec<Uuid>, repriced: Vec<Uuid> },
    CheckedOut { cart_id: Uuid, subtotal: Decimal, total: Decimal },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponEvent {
    Applied { cart_id: Uuid, code: String, affiliate_user: Option<String> },
    Removed { cart_id: Uuid, code: String },
    Redeemed { code: String },
}

impl DomainEvent {
    /// Subject suffix, e.g. `cart.item_added`.
    pub fn subject(&self) -> String {
        let (aggregate, name) = match self {
            Self::Cart(e) => ("cart", match e {
                CartEvent::ItemAdded { .. } => "item_added",
                CartEvent::QuantityUpdated { .. } => "quantity_updated",
                CartEvent::ItemRemoved { .. } => "item_removed",
                CartEvent::Cleared { .. } => "cleared",
                CartEvent::Repaired { .. } => "repaired",
                CartEvent::CheckedOut { .. } => "checked_out",
            }),
            Self::Coupon(e) => ("coupon", match e {
                CouponEvent::Applied { .. } => "applied",
                CouponEvent::Removed { .. } => "removed",
                CouponEvent::Redeemed { .. } => "redeemed",
            }),
        };
        format!("{aggregate}.{name}")
    }
}

impl From<CartEvent> for DomainEvent { fn from(e: CartEvent) -> Self { Self::Cart(e) } }
impl From<CouponEvent> for DomainEvent { fn from(e: CouponEvent) -> Self { Self::Coupon(e) } }

/// Outbound sink for domain events. Delivery is best effort.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
#[error("event publish failed: {0}")]
pub struct PublishError(pub String);
