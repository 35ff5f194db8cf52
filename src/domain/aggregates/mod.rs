//! Aggregates module
pub mod product;
pub mod cart;
pub mod coupon;

pub use product::{Product, SizeStock, UnavailableReason, Variant};
pub use cart::{Cart, CartError, CartItem, LineKey, VariantSelection};
pub use coupon::{AppliedCoupon, Coupon, CouponDefinitionError, CouponRejection, Discount, DiscountTerms, DiscountType, EligibleProduct};
