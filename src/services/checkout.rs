//! Final `{cart, total, discount}` snapshot handed to order assembly.
//!
//! The applied coupon is re-validated here and its discount recomputed from
//! the terms captured at application time, not from the live coupon.

use rust_decimal::Decimal;
use serde::Serialize;

use super::cart_validator::{CartValidator, UnavailableItem};
use super::coupon_service::CouponService;
use super::ServiceContext;
use crate::domain::aggregates::{Cart, Coupon, Discount};
use crate::domain::events::{CartEvent, CouponEvent};
use crate::error::{Result, StoreError};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSnapshot {
    pub cart: Cart,
    pub subtotal: Decimal,
    pub discount: Option<Discount>,
    pub discount_amount: Decimal,
    pub free_shipping: bool,
    pub total: Decimal,
    pub unavailable_items: Vec<UnavailableItem>,
}

#[derive(Clone, Debug)]
pub struct CheckoutService {
    ctx: ServiceContext,
    validator: CartValidator,
    coupons: CouponService,
}

impl CheckoutService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { validator: CartValidator::new(ctx.clone()), coupons: CouponService::new(ctx.clone()), ctx }
    }

    #[tracing::instrument(skip(self))]
    pub async fn snapshot(&self, user_id: &str) -> Result<CheckoutSnapshot> {
        let _guard = self.ctx.locks.lock(user_id).await;
        Ok(self.build(user_id).await?.0)
    }

    /// Redeems the applied coupon, then empties the cart and drops the coupon.
    /// A coupon whose recomputed discount is zero is dropped without using
    /// up one of its redemptions.
    #[tracing::instrument(skip(self))]
    pub async fn complete(&self, user_id: &str) -> Result<CheckoutSnapshot> {
        let _guard = self.ctx.locks.lock(user_id).await;
        let (snapshot, coupon) = self.build(user_id).await?;

        let redeemable = snapshot.discount.is_some_and(|d| d.has_effect());
        if let Some(coupon) = coupon.as_ref().filter(|_| redeemable) {
            if !self.ctx.call(self.ctx.coupons.increment_usage(coupon.id)).await? {
                return Err(StoreError::validation("Coupon usage limit reached"));
            }
            self.ctx.publish(CouponEvent::Redeemed { code: coupon.code.to_string() }).await;
        }

        let mut cart = snapshot.cart.clone();
        cart.clear();
        cart.remove_coupon();
        let cart = self.ctx.save_cart(&cart).await?;
        tracing::info!(cart_id = %cart.id, total = %snapshot.total, "checked out cart");
        self.ctx
            .publish(CartEvent::CheckedOut { cart_id: cart.id, subtotal: snapshot.subtotal, total: snapshot.total })
            .await;
        Ok(snapshot)
    }

    async fn build(&self, user_id: &str) -> Result<(CheckoutSnapshot, Option<Coupon>)> {
        let cart = self.ctx.existing_cart(user_id).await?;
        let reconciled = self.validator.reconcile(cart).await?;
        let result = reconciled.result;
        if result.cart.is_empty() {
            return Err(StoreError::validation("Cart is empty"));
        }
        let subtotal = result.total;

        let (discount, coupon) = match &result.cart.coupon {
            None => (None, None),
            Some(applied) => {
                let coupon = self.coupons.validate_coupon(applied.code.as_str(), user_id, &reconciled.products).await?;
                applied
                    .terms
                    .check_minimum(subtotal)
                    .map_err(|rejection| StoreError::validation(rejection.to_string()))?;
                (Some(applied.terms.calculate_discount(subtotal)), Some(coupon))
            }
        };

        let discount_amount = discount.map_or(Decimal::ZERO, |d| d.amount());
        let snapshot = CheckoutSnapshot {
            subtotal,
            discount_amount,
            free_shipping: discount.is_some_and(|d| d.is_free_shipping()),
            total: subtotal - discount_amount,
            discount,
            unavailable_items: result.unavailable_items,
            cart: result.cart,
        };
        Ok((snapshot, coupon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::DiscountType;
    use crate::repositories::CartStore;
    use crate::services::test_support::{dec, Fixture};
    use crate::services::{AddItem, CartService};

    async fn fill(fx: &Fixture, price: i64, qty: u32) {
        let product = fx.product(price, &[("M", 10)]).await;
        CartService::new(fx.ctx.clone())
            .add_item("user-1", AddItem { product_id: product.id, color: "black".into(), size: "M".into(), quantity: Some(qty) })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_uses_applied_terms() {
        let fx = Fixture::new();
        fill(&fx, 100, 2).await;
        fx.coupon("TEN", DiscountType::Percentage, Some(10), |_| {}).await;
        CouponService::new(fx.ctx.clone()).apply_coupon("TEN", "user-1").await.unwrap();
        // Later edits to the live coupon do not change the applied terms.
        fx.coupon("TEN", DiscountType::Percentage, Some(50), |_| {}).await;

        let snapshot = CheckoutService::new(fx.ctx.clone()).snapshot("user-1").await.unwrap();

        assert_eq!(snapshot.subtotal, dec(200));
        assert_eq!(snapshot.discount_amount, dec(20));
        assert_eq!(snapshot.total, dec(180));
        assert!(!snapshot.free_shipping);
    }

    #[tokio::test]
    async fn test_empty_cart_cannot_check_out() {
        let fx = Fixture::new();
        fx.carts.create("user-1").await.unwrap();
        let result = CheckoutService::new(fx.ctx.clone()).snapshot("user-1").await;
        assert_eq!(result, Err(StoreError::validation("Cart is empty")));
    }

    #[tokio::test]
    async fn test_complete_redeems_and_clears() {
        let fx = Fixture::new();
        fill(&fx, 100, 1).await;
        let coupon = fx.coupon("ONCE", DiscountType::Fixed, Some(10), |c| c.usage_limit = Some(1)).await;
        CouponService::new(fx.ctx.clone()).apply_coupon("ONCE", "user-1").await.unwrap();

        let snapshot = CheckoutService::new(fx.ctx.clone()).complete("user-1").await.unwrap();

        assert_eq!(snapshot.total, dec(90));
        let cart = fx.carts.find_by_owner("user-1").await.unwrap().unwrap();
        assert!(cart.items.is_empty());
        assert!(cart.coupon.is_none());
        assert_eq!(fx.coupons.get(&coupon.code).await.unwrap().used_count, 1);
        assert!(fx.events.subjects().contains(&"cart.checked_out".to_string()));
    }

    #[tokio::test]
    async fn test_exhausted_coupon_blocks_checkout() {
        let fx = Fixture::new();
        fill(&fx, 100, 1).await;
        let coupon = fx.coupon("ONCE", DiscountType::Fixed, Some(10), |c| c.usage_limit = Some(1)).await;
        CouponService::new(fx.ctx.clone()).apply_coupon("ONCE", "user-1").await.unwrap();
        fx.coupons.upsert(Coupon { used_count: 1, ..coupon }).await;

        let result = CheckoutService::new(fx.ctx.clone()).complete("user-1").await;

        assert_eq!(result, Err(StoreError::validation("Coupon usage limit reached")));
        let cart = fx.carts.find_by_owner("user-1").await.unwrap().unwrap();
        assert_eq!(cart.items.len(), 1, "cart kept on failed checkout");
    }

    #[tokio::test]
    async fn test_zero_discount_does_not_consume_coupon() {
        let fx = Fixture::new();
        let product = fx.product(100, &[("M", 10)]).await;
        CartService::new(fx.ctx.clone())
            .add_item("user-1", AddItem { product_id: product.id, color: "black".into(), size: "M".into(), quantity: Some(1) })
            .await
            .unwrap();
        let coupon = fx.coupon("ONEPCT", DiscountType::Percentage, Some(1), |c| c.usage_limit = Some(1)).await;
        CouponService::new(fx.ctx.clone()).apply_coupon("ONEPCT", "user-1").await.unwrap();
        fx.catalog.update(product.id, |p| p.price = Decimal::new(4, 1)).await;

        let snapshot = CheckoutService::new(fx.ctx.clone()).complete("user-1").await.unwrap();

        assert_eq!(snapshot.discount_amount, Decimal::ZERO);
        assert_eq!(snapshot.total, Decimal::new(4, 1));
        assert_eq!(fx.coupons.get(&coupon.code).await.unwrap().used_count, 0);
        assert!(!fx.events.subjects().contains(&"coupon.redeemed".to_string()));
        let cart = fx.carts.find_by_owner("user-1").await.unwrap().unwrap();
        assert!(cart.coupon.is_none());
    }
}
