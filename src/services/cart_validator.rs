//! Reconciles a stored cart against live catalog state.
//!
//! Each line is looked up in cart order. Lines that cannot be sold are dropped
//! (never clamped to stock) and reported; the rest get fresh price snapshots.
//! If anything was dropped or repriced the repaired cart is written back, so
//! this is a read-with-repair operation rather than a pure query. A failed
//! lookup fails the whole validation; there is no partial result.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::ServiceContext;
use crate::domain::aggregates::{Cart, EligibleProduct, Product, UnavailableReason, VariantSelection};
use crate::domain::events::CartEvent;
use crate::domain::value_objects::Quantity;
use crate::error::{Result, StoreError};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub cart: Cart,
    /// Sum of current unit price times quantity over available lines.
    pub total: Decimal,
    pub prices_updated: bool,
    pub unavailable_items: Vec<UnavailableItem>,
    pub all_items_available: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailableItem {
    pub item_id: Uuid,
    pub product_id: Uuid,
    /// `None` when the product no longer resolves.
    pub product: Option<Product>,
    pub variant: VariantSelection,
    pub quantity: Quantity,
    pub reason: UnavailableReason,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub prices_updated: bool,
    pub all_items_available: bool,
    pub unavailable_items: Vec<UnavailableItem>,
}

impl ValidationResult {
    /// Result for a cart known to be empty.
    pub fn empty(cart: Cart) -> Self {
        Self { cart, total: Decimal::ZERO, prices_updated: false, unavailable_items: vec![], all_items_available: true }
    }

    pub fn summary(self) -> ValidationSummary {
        ValidationSummary {
            prices_updated: self.prices_updated,
            all_items_available: self.all_items_available,
            unavailable_items: self.unavailable_items,
        }
    }
}

/// Validation result plus the resolved products of the surviving lines,
/// which coupon eligibility needs.
#[derive(Clone, Debug)]
pub(crate) struct Reconciliation {
    pub result: ValidationResult,
    pub products: Vec<EligibleProduct>,
}

#[derive(Clone, Debug)]
pub struct CartValidator {
    ctx: ServiceContext,
}

impl CartValidator {
    pub fn new(ctx: ServiceContext) -> Self { Self { ctx } }

    /// Validates the cart with id `cart_id` and persists any repair.
    /// Callers that mutate the cart should hold the owner's lock.
    #[tracing::instrument(skip(self))]
    pub async fn validate(&self, cart_id: Uuid) -> Result<ValidationResult> {
        let cart = self
            .ctx
            .call(self.ctx.carts.find_by_id(cart_id))
            .await?
            .ok_or_else(|| StoreError::not_found("Cart not found"))?;
        Ok(self.reconcile(cart).await?.result)
    }

    pub(crate) async fn reconcile(&self, mut cart: Cart) -> Result<Reconciliation> {
        let now = Utc::now();
        let original = std::mem::take(&mut cart.items);
        let mut kept = Vec::with_capacity(original.len());
        let mut unavailable = Vec::new();
        let mut products = Vec::new();
        let mut repriced = Vec::new();
        let mut snapshot_changed = false;
        let mut total = Decimal::ZERO;

        for mut item in original {
            let product = self.ctx.call(self.ctx.catalog.get_product(item.product_id)).await?;
            let verdict = match product {
                None => Err((None, UnavailableReason::ProductUnavailable)),
                Some(product) => match product.availability(&item.variant.color, &item.variant.size, item.quantity.value()) {
                    Ok(_) => Ok(product),
                    Err(reason) => Err((Some(product), reason)),
                },
            };

            match verdict {
                Err((product, reason)) => {
                    tracing::warn!(cart_id = %cart.id, item_id = %item.id, %reason, "dropping unavailable cart item");
                    unavailable.push(UnavailableItem {
                        item_id: item.id, product_id: item.product_id, product,
                        variant: item.variant, quantity: item.quantity, reason,
                    });
                }
                Ok(product) => {
                    let before = (item.price_at_addition, item.discounted_price_at_addition);
                    if item.reprice(&product, now) { repriced.push(item.id); }
                    snapshot_changed |= before != (item.price_at_addition, item.discounted_price_at_addition);
                    total += product.current_price() * Decimal::from(item.quantity.value());
                    products.push(EligibleProduct { product_id: product.id, category: product.category.clone() });
                    kept.push(item);
                }
            }
        }

        cart.items = kept;
        if !unavailable.is_empty() || snapshot_changed {
            cart = self.ctx.save_cart(&cart).await?;
            tracing::info!(cart_id = %cart.id, dropped = unavailable.len(), repriced = repriced.len(), "repaired cart");
            self.ctx
                .publish(CartEvent::Repaired {
                    cart_id: cart.id,
                    dropped: unavailable.iter().map(|u| u.item_id).collect(),
                    repriced: repriced.clone(),
                })
                .await;
        }

        let all_items_available = unavailable.is_empty();
        Ok(Reconciliation {
            result: ValidationResult {
                cart, total, prices_updated: !repriced.is_empty(),
                unavailable_items: unavailable, all_items_available,
            },
            products,
        })
    }
}
