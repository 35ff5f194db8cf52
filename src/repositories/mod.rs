//! Collaborator seams consumed by the services.
//!
//! Catalog lookups are plain reads. Cart saves are compare-and-swap on
//! `Cart::version`, and coupon redemption is a conditional increment.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Coupon, Product};
use crate::domain::value_objects::CouponCode;
use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// `Ok(None)` when the product no longer exists.
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Cart>>;
    async fn find_by_owner(&self, owner_id: &str) -> Result<Option<Cart>>;
    /// Inserts an empty cart. Returns the existing one if the owner already has a cart.
    async fn create(&self, owner_id: &str) -> Result<Cart>;
    /// Writes `cart` if the stored version still equals `cart.version` and
    /// returns it with the bumped version. Otherwise `StoreError::Conflict`.
    async fn save(&self, cart: &Cart) -> Result<Cart>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>>;
    /// Increments `used_count` only while it is below `usage_limit`.
    /// Returns `false` when the limit had already been reached.
    async fn increment_usage(&self, id: Uuid) -> Result<bool>;
}
