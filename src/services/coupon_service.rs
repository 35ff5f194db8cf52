//! Coupon eligibility and application.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use super::cart_validator::CartValidator;
use super::ServiceContext;
use crate::domain::aggregates::{Coupon, Discount, DiscountType, EligibleProduct};
use crate::domain::events::CouponEvent;
use crate::domain::value_objects::CouponCode;
use crate::error::{Result, StoreError};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponApplication {
    /// False when the coupon is valid but has no effect on this cart.
    pub coupon_valid: bool,
    pub coupon: CouponSummary,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponSummary {
    pub code: CouponCode,
    pub discount_type: DiscountType,
    pub value: Option<Decimal>,
    pub discount_amount: Decimal,
    pub free_shipping: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateAttribution {
    pub code: CouponCode,
    pub affiliate_user: Option<String>,
}

fn invalid_coupon() -> StoreError { StoreError::validation("Invalid coupon") }

#[derive(Clone, Debug)]
pub struct CouponService {
    ctx: ServiceContext,
    validator: CartValidator,
}

impl CouponService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { validator: CartValidator::new(ctx.clone()), ctx }
    }

    async fn load(&self, code: &str) -> Result<Coupon> {
        let code = CouponCode::new(code).map_err(|_| invalid_coupon())?;
        self.ctx.call(self.ctx.coupons.find_by_code(&code)).await?.ok_or_else(invalid_coupon)
    }

    /// Checks a coupon against the requesting user and the products in the
    /// cart, failing with the first reason that applies.
    pub async fn validate_coupon(&self, code: &str, user_id: &str, products: &[EligibleProduct]) -> Result<Coupon> {
        let coupon = self.load(code).await?;
        coupon
            .check_eligibility(user_id, products, Utc::now())
            .map_err(|rejection| StoreError::validation(rejection.to_string()))?;
        Ok(coupon)
    }

    pub fn calculate_discount(&self, coupon: &Coupon, subtotal: Decimal) -> Discount {
        coupon.calculate_discount(subtotal)
    }

    /// Applies `code` to the owner's cart. A coupon with zero effect is
    /// reported as not applied and nothing is persisted.
    #[tracing::instrument(skip(self))]
    pub async fn apply_coupon(&self, code: &str, user_id: &str) -> Result<CouponApplication> {
        let _guard = self.ctx.locks.lock(user_id).await;
        let cart = self.ctx.existing_cart(user_id).await?;
        let reconciled = self.validator.reconcile(cart).await?;
        let total = reconciled.result.total;

        let coupon = self.validate_coupon(code, user_id, &reconciled.products).await?;
        coupon
            .terms()
            .check_minimum(total)
            .map_err(|rejection| StoreError::validation(rejection.to_string()))?;
        let discount = self.calculate_discount(&coupon, total);
        let summary = CouponSummary {
            code: coupon.code.clone(),
            discount_type: coupon.discount_type,
            value: coupon.value,
            discount_amount: discount.amount(),
            free_shipping: discount.is_free_shipping(),
        };

        if !discount.has_effect() {
            tracing::info!(code = %coupon.code, "coupon valid but yields no discount");
            return Ok(CouponApplication { coupon_valid: false, coupon: summary });
        }

        let mut cart = reconciled.result.cart;
        let applied = coupon.snapshot(discount, Utc::now());
        let affiliate_user = applied.affiliate_user.clone();
        cart.apply_coupon(applied);
        let cart = self.ctx.save_cart(&cart).await?;
        tracing::info!(cart_id = %cart.id, code = %coupon.code, "applied coupon");
        self.ctx
            .publish(CouponEvent::Applied { cart_id: cart.id, code: coupon.code.to_string(), affiliate_user })
            .await;
        Ok(CouponApplication { coupon_valid: true, coupon: summary })
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_coupon(&self, user_id: &str) -> Result<bool> {
        let _guard = self.ctx.locks.lock(user_id).await;
        let mut cart = self.ctx.existing_cart(user_id).await?;
        let Some(removed) = cart.remove_coupon() else { return Ok(true) };
        let cart = self.ctx.save_cart(&cart).await?;
        tracing::info!(cart_id = %cart.id, code = %removed.code, "removed coupon");
        self.ctx.publish(CouponEvent::Removed { cart_id: cart.id, code: removed.code.to_string() }).await;
        Ok(true)
    }

    /// Resolves a tracking-link code for landing-page auto-apply.
    pub async fn affiliate_attribution(&self, code: &str) -> Result<AffiliateAttribution> {
        let coupon = self.load(code).await.map_err(|e| match e {
            StoreError::Validation(message) => StoreError::NotFound(message),
            other => other,
        })?;
        if !coupon.is_active || !coupon.is_affiliate_link {
            return Err(StoreError::not_found("Invalid coupon"));
        }
        Ok(AffiliateAttribution { code: coupon.code, affiliate_user: coupon.affiliate_user })
    }
}
