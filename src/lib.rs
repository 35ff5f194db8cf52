//! Storefront cart engine
//!
//! Keeps persisted carts consistent with the live product catalog and
//! evaluates coupons on top of the validated total.
//!
//! ## Features
//! - Cart validation with price revalidation and stock checks
//! - Add / update / remove / clear with per-owner serialization
//! - Coupon eligibility, discount calculation and application
//! - Checkout snapshot with atomic coupon redemption
//! - Guest cart merge and affiliate code attribution

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod messaging;
pub mod repositories;
pub mod services;

pub use config::{AppConfig, ConfigError};
pub use domain::aggregates::{
    AppliedCoupon, Cart, CartItem, Coupon, Discount, DiscountType, Product, SizeStock, UnavailableReason, Variant,
    VariantSelection,
};
pub use domain::value_objects::{CouponCode, Quantity};
pub use error::{Result, StoreError};
pub use services::{
    CartService, CartValidator, CheckoutService, CheckoutSnapshot, CouponApplication, CouponService, ServiceContext,
    UnavailableItem, ValidationResult, ValidationSummary,
};
