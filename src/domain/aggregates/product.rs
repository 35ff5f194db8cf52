//! Product Aggregate
//!
//! Read-only view of a catalog product as the cart engine sees it. The
//! catalog owns these records; the cart only looks them up.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    /// Always below `price` when present.
    pub discounted_price: Option<Decimal>,
    pub category: Option<String>,
    pub is_active: bool,
    pub variants: Vec<Variant>,
}

/// A purchasable color, split into sizes with independent stock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant { pub color: String, pub sizes: Vec<SizeStock> }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeStock { pub size: String, pub stock: u32 }

/// Why a color/size pair cannot currently be sold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnavailableReason { ProductUnavailable, ColorUnavailable, SizeUnavailable, InsufficientStock }

impl Product {
    pub fn create(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(), name: name.into(), price, discounted_price: None,
            category: None, is_active: true, variants: vec![],
        }
    }

    /// Price a shopper pays right now.
    pub fn current_price(&self) -> Decimal { self.discounted_price.unwrap_or(self.price) }

    pub fn variant(&self, color: &str) -> Option<&Variant> { self.variants.iter().find(|v| v.color == color) }

    /// Stock for a color/size pair, or the first reason it cannot be resolved.
    pub fn stock_for(&self, color: &str, size: &str) -> Result<u32, UnavailableReason> {
        let variant = self.variant(color).ok_or(UnavailableReason::ColorUnavailable)?;
        let size = variant.size(size).ok_or(UnavailableReason::SizeUnavailable)?;
        Ok(size.stock)
    }

    /// Resolves stock and checks it covers `quantity`.
    pub fn availability(&self, color: &str, size: &str, quantity: u32) -> Result<u32, UnavailableReason> {
        if !self.is_active { return Err(UnavailableReason::ProductUnavailable); }
        let stock = self.stock_for(color, size)?;
        if stock < quantity { return Err(UnavailableReason::InsufficientStock); }
        Ok(stock)
    }

    pub fn with_variant(mut self, color: impl Into<String>, sizes: &[(&str, u32)]) -> Self {
        let sizes = sizes.iter().map(|(size, stock)| SizeStock { size: (*size).to_string(), stock: *stock }).collect();
        self.variants.push(Variant { color: color.into(), sizes });
        self
    }

    pub fn with_discounted_price(mut self, price: Decimal) -> Self { self.discounted_price = Some(price); self }
    pub fn with_category(mut self, category: impl Into<String>) -> Self { self.category = Some(category.into()); self }
}

impl Variant {
    pub fn size(&self, size: &str) -> Option<&SizeStock> { self.sizes.iter().find(|s| s.size == size) }
}

impl UnavailableReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProductUnavailable => "product_unavailable",
            Self::ColorUnavailable => "color_unavailable",
            Self::SizeUnavailable => "size_unavailable",
            Self::InsufficientStock => "insufficient_stock",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::ProductUnavailable => "Product no longer available",
            Self::ColorUnavailable => "Color no longer available",
            Self::SizeUnavailable => "Size no longer available",
            Self::InsufficientStock => "Insufficient stock",
        }
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.message()) }
}

impl Serialize for UnavailableReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("UnavailableReason", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", self.message())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tee() -> Product {
        Product::create("Tee", Decimal::new(500, 0)).with_variant("black", &[("M", 3), ("L", 0)])
    }

    #[test]
    fn test_current_price_prefers_discount() {
        let p = tee();
        assert_eq!(p.current_price(), Decimal::new(500, 0));
        assert_eq!(p.with_discounted_price(Decimal::new(400, 0)).current_price(), Decimal::new(400, 0));
    }

    #[test]
    fn test_availability_order() {
        let p = tee();
        assert_eq!(p.availability("red", "M", 1), Err(UnavailableReason::ColorUnavailable));
        assert_eq!(p.availability("black", "S", 1), Err(UnavailableReason::SizeUnavailable));
        assert_eq!(p.availability("black", "L", 1), Err(UnavailableReason::InsufficientStock));
        assert_eq!(p.availability("black", "M", 3), Ok(3));
        let mut inactive = tee();
        inactive.is_active = false;
        assert_eq!(inactive.availability("black", "M", 1), Err(UnavailableReason::ProductUnavailable));
    }

    #[test]
    fn test_reason_serializes_code_and_message() {
        let json = serde_json::to_value(UnavailableReason::SizeUnavailable).unwrap();
        assert_eq!(json["code"], "size_unavailable");
        assert_eq!(json["message"], "Size no longer available");
    }
}
