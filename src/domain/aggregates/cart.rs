//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::coupon::AppliedCoupon;
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::Quantity;

/// One cart per owner. Items keep insertion order for display only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: Uuid,
    pub owner_id: String,
    pub items: Vec<CartItem>,
    pub coupon: Option<AppliedCoupon>,
    /// Bumped by the store on every successful save.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant: VariantSelection,
    pub quantity: Quantity,
    pub price_at_addition: Decimal,
    pub discounted_price_at_addition: Option<Decimal>,
    pub price_updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantSelection { pub color: String, pub size: String }

/// Identity of a line: a product in one color and size.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LineKey { pub product_id: Uuid, pub variant: VariantSelection }

impl VariantSelection {
    pub fn new(color: impl Into<String>, size: impl Into<String>) -> Self { Self { color: color.into(), size: size.into() } }
}

impl CartItem {
    pub fn key(&self) -> LineKey { LineKey { product_id: self.product_id, variant: self.variant.clone() } }

    /// Unit price recorded when the line was added or last revalidated.
    pub fn stored_price(&self) -> Decimal { self.discounted_price_at_addition.unwrap_or(self.price_at_addition) }

    /// Copies current catalog prices onto the snapshot. Returns whether the
    /// effective unit price moved.
    pub fn reprice(&mut self, product: &Product, now: DateTime<Utc>) -> bool {
        let changed = product.current_price() != self.stored_price();
        self.price_at_addition = product.price;
        self.discounted_price_at_addition = product.discounted_price;
        if changed { self.price_updated_at = now; }
        changed
    }

    pub fn line_total(&self) -> Decimal { self.stored_price() * Decimal::from(self.quantity.value()) }
}

impl Cart {
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), owner_id: owner_id.into(), items: vec![], coupon: None,
            version: 0, created_at: now, updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn item(&self, item_id: Uuid) -> Option<&CartItem> { self.items.iter().find(|i| i.id == item_id) }

    /// Line keys are unique within a cart, so this is a keyed lookup rather
    /// than a positional one.
    pub fn find_line(&self, key: &LineKey) -> Option<&CartItem> { self.items.iter().find(|i| &i.key() == key) }

    /// Merges into the line with the same key or appends a new one priced
    /// from `product`. Returns the line id.
    pub fn add_line(&mut self, product: &Product, variant: VariantSelection, quantity: Quantity, now: DateTime<Utc>) -> Uuid {
        let key = LineKey { product_id: product.id, variant };
        if let Some(existing) = self.items.iter_mut().find(|i| i.key() == key) {
            existing.quantity = existing.quantity.add(quantity);
            let id = existing.id;
            self.touch(now);
            return id;
        }
        let item = CartItem {
            id: Uuid::now_v7(), product_id: product.id, variant: key.variant, quantity,
            price_at_addition: product.price, discounted_price_at_addition: product.discounted_price,
            price_updated_at: now,
        };
        let id = item.id;
        self.items.push(item);
        self.touch(now);
        id
    }

    pub fn set_quantity(&mut self, item_id: Uuid, quantity: Quantity, now: DateTime<Utc>) -> Result<(), CartError> {
        let item = self.items.iter_mut().find(|i| i.id == item_id).ok_or(CartError::ItemNotFound)?;
        item.quantity = quantity;
        item.price_updated_at = now;
        self.touch(now);
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: Uuid) -> Result<CartItem, CartError> {
        let pos = self.items.iter().position(|i| i.id == item_id).ok_or(CartError::ItemNotFound)?;
        let removed = self.items.remove(pos);
        self.touch(Utc::now());
        Ok(removed)
    }

    pub fn clear(&mut self) { self.items.clear(); self.touch(Utc::now()); }

    pub fn apply_coupon(&mut self, coupon: AppliedCoupon) { self.coupon = Some(coupon); self.touch(Utc::now()); }

    pub fn remove_coupon(&mut self) -> Option<AppliedCoupon> {
        let removed = self.coupon.take();
        self.touch(Utc::now());
        removed
    }

    fn touch(&mut self, now: DateTime<Utc>) { self.updated_at = now; }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { ItemNotFound }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Item not found in cart") }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tee() -> Product {
        Product::create("Tee", Decimal::new(500, 0)).with_variant("black", &[("M", 5), ("L", 5)])
    }

    #[test]
    fn test_add_line_merges_same_variant() {
        let product = tee();
        let mut cart = Cart::for_owner("user-1");
        let first = cart.add_line(&product, VariantSelection::new("black", "M"), Quantity::new(2).unwrap(), Utc::now());
        let second = cart.add_line(&product, VariantSelection::new("black", "M"), Quantity::ONE, Utc::now());
        assert_eq!(first, second);
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity.value(), 3); // Merged
    }

    #[test]
    fn test_new_size_is_distinct_line() {
        let product = tee();
        let mut cart = Cart::for_owner("user-1");
        cart.add_line(&product, VariantSelection::new("black", "M"), Quantity::ONE, Utc::now());
        cart.add_line(&product, VariantSelection::new("black", "L"), Quantity::ONE, Utc::now());
        assert_eq!(cart.items.len(), 2);
        let key = LineKey { product_id: product.id, variant: VariantSelection::new("black", "L") };
        assert_eq!(cart.find_line(&key).map(|i| i.quantity.value()), Some(1));
    }

    #[test]
    fn test_remove_missing_item_leaves_cart() {
        let mut cart = Cart::for_owner("user-1");
        cart.add_line(&tee(), VariantSelection::new("black", "M"), Quantity::ONE, Utc::now());
        let before = cart.clone();
        assert_eq!(cart.remove_item(Uuid::now_v7()), Err(CartError::ItemNotFound));
        assert_eq!(cart.items, before.items);
        assert_eq!(CartError::ItemNotFound.to_string(), "Item not found in cart");
    }

    #[test]
    fn test_reprice_tracks_effective_price() {
        let mut product = tee();
        let mut cart = Cart::for_owner("user-1");
        let added_at = Utc::now() - chrono::Duration::hours(1);
        cart.add_line(&product, VariantSelection::new("black", "M"), Quantity::ONE, added_at);
        let item = &mut cart.items[0];

        assert!(!item.reprice(&product, Utc::now()));
        assert_eq!(item.price_updated_at, added_at);

        product.discounted_price = Some(Decimal::new(400, 0));
        assert!(item.reprice(&product, Utc::now()));
        assert_eq!(item.stored_price(), Decimal::new(400, 0));
        assert!(item.price_updated_at > added_at);
    }
}
