//! Coupon Aggregate
//!
//! Coupons are authored by administrators and only read here, apart from the
//! usage counter which is bumped on redemption. Eligibility checks run in a
//! fixed order and stop at the first failure, because each failure carries a
//! shopper-facing message.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use crate::domain::value_objects::CouponCode;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: Uuid,
    pub code: CouponCode,
    pub discount_type: DiscountType,
    /// Absent only for free-shipping coupons.
    pub value: Option<Decimal>,
    pub min_cart_value: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub usage_limit: Option<u32>,
    pub used_count: u32,
    pub user_specific: Option<String>,
    pub product_specific: Vec<Uuid>,
    pub category_specific: Vec<String>,
    pub is_active: bool,
    pub is_affiliate_link: bool,
    pub affiliate_user: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
    FreeShipping,
    #[serde(other)]
    Unknown,
}

/// Effect of a coupon on a subtotal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discount {
    Amount { value: Decimal },
    FreeShipping,
}

/// The parts of a coupon that determine its effect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountTerms {
    pub discount_type: DiscountType,
    pub value: Option<Decimal>,
    pub max_discount_amount: Option<Decimal>,
    pub min_cart_value: Option<Decimal>,
}

/// Snapshot written onto the cart when a coupon is applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCoupon {
    pub code: CouponCode,
    #[serde(flatten)]
    pub terms: DiscountTerms,
    pub discount: Discount,
    pub affiliate_user: Option<String>,
    pub applied_at: DateTime<Utc>,
}

/// A product in the cart as coupon eligibility sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EligibleProduct { pub product_id: Uuid, pub category: Option<String> }

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    Invalid,
    Expired,
    NotYetActive,
    UsageLimitReached,
    WrongUser,
    WrongProducts,
    WrongCategories,
    BelowMinimum(Decimal),
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CouponDefinitionError { MissingValue, NegativeValue }

impl Discount {
    pub fn amount(&self) -> Decimal {
        match self { Self::Amount { value } => *value, Self::FreeShipping => Decimal::ZERO }
    }
    pub fn is_free_shipping(&self) -> bool { matches!(self, Self::FreeShipping) }

    /// A zero amount leaves the cart untouched and is not treated as applied.
    pub fn has_effect(&self) -> bool {
        match self { Self::Amount { value } => *value > Decimal::ZERO, Self::FreeShipping => true }
    }
}

impl DiscountTerms {
    pub fn calculate_discount(&self, subtotal: Decimal) -> Discount {
        let subtotal = subtotal.max(Decimal::ZERO);
        let value = self.value.unwrap_or(Decimal::ZERO).max(Decimal::ZERO);
        let amount = match self.discount_type {
            DiscountType::Percentage => {
                let raw = (subtotal * value / Decimal::ONE_HUNDRED)
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
                let capped = self.max_discount_amount.map_or(raw, |cap| raw.min(cap.max(Decimal::ZERO)));
                capped.min(subtotal)
            }
            DiscountType::Fixed => value.min(subtotal),
            DiscountType::FreeShipping => return Discount::FreeShipping,
            DiscountType::Unknown => Decimal::ZERO,
        };
        Discount::Amount { value: amount }
    }

    pub fn check_minimum(&self, total: Decimal) -> Result<(), CouponRejection> {
        match self.min_cart_value {
            Some(min) if total < min => Err(CouponRejection::BelowMinimum(min)),
            _ => Ok(()),
        }
    }
}

impl Coupon {
    pub fn new(code: CouponCode, discount_type: DiscountType, value: Option<Decimal>) -> Result<Self, CouponDefinitionError> {
        if discount_type != DiscountType::FreeShipping {
            match value {
                None => return Err(CouponDefinitionError::MissingValue),
                Some(v) if v < Decimal::ZERO => return Err(CouponDefinitionError::NegativeValue),
                Some(_) => {}
            }
        }
        Ok(Self {
            id: Uuid::now_v7(), code, discount_type, value, min_cart_value: None, max_discount_amount: None,
            start_date: None, end_date: None, usage_limit: None, used_count: 0, user_specific: None,
            product_specific: vec![], category_specific: vec![], is_active: true,
            is_affiliate_link: false, affiliate_user: None,
        })
    }

    pub fn terms(&self) -> DiscountTerms {
        DiscountTerms {
            discount_type: self.discount_type, value: self.value,
            max_discount_amount: self.max_discount_amount, min_cart_value: self.min_cart_value,
        }
    }

    pub fn calculate_discount(&self, subtotal: Decimal) -> Discount { self.terms().calculate_discount(subtotal) }

    pub fn has_remaining_uses(&self) -> bool { self.usage_limit.map_or(true, |limit| self.used_count < limit) }

    /// Runs the eligibility checks in order, failing at the first miss.
    pub fn check_eligibility(&self, user_id: &str, products: &[EligibleProduct], now: DateTime<Utc>) -> Result<(), CouponRejection> {
        if !self.is_active { return Err(CouponRejection::Invalid); }
        if self.end_date.is_some_and(|end| end <= now) { return Err(CouponRejection::Expired); }
        if self.start_date.is_some_and(|start| start > now) { return Err(CouponRejection::NotYetActive); }
        if !self.has_remaining_uses() { return Err(CouponRejection::UsageLimitReached); }
        if self.user_specific.as_deref().is_some_and(|owner| owner != user_id) { return Err(CouponRejection::WrongUser); }
        if !self.product_specific.is_empty() && !products.iter().any(|p| self.product_specific.contains(&p.product_id)) {
            return Err(CouponRejection::WrongProducts);
        }
        if !self.category_specific.is_empty()
            && !products.iter().any(|p| p.category.as_ref().is_some_and(|c| self.category_specific.contains(c)))
        {
            return Err(CouponRejection::WrongCategories);
        }
        Ok(())
    }

    pub fn snapshot(&self, discount: Discount, now: DateTime<Utc>) -> AppliedCoupon {
        AppliedCoupon {
            code: self.code.clone(), terms: self.terms(), discount,
            affiliate_user: if self.is_affiliate_link { self.affiliate_user.clone() } else { None },
            applied_at: now,
        }
    }
}

impl std::error::Error for CouponRejection {}
impl fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "Invalid coupon"),
            Self::Expired => write!(f, "Coupon expired"),
            Self::NotYetActive => write!(f, "Coupon not yet active"),
            Self::UsageLimitReached => write!(f, "Coupon usage limit reached"),
            Self::WrongUser => write!(f, "Coupon not valid for this user"),
            Self::WrongProducts => write!(f, "Coupon not valid for cart items"),
            Self::WrongCategories => write!(f, "Coupon not valid for these categories"),
            Self::BelowMinimum(min) => write!(f, "Minimum cart value of {min} required"),
        }
    }
}

impl std::error::Error for CouponDefinitionError {}
impl fmt::Display for CouponDefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::MissingValue => write!(f, "Discount value required"), Self::NegativeValue => write!(f, "Discount value must not be negative") }
    }
}
