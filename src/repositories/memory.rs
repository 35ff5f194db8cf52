//! In-process implementations with the same semantics as the PostgreSQL ones.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CartStore, CouponRepository, ProductCatalog};
use crate::domain::aggregates::{Cart, Coupon, Product};
use crate::domain::value_objects::CouponCode;
use crate::error::{Result, StoreError};

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    products: RwLock<HashMap<Uuid, Product>>,
}

impl MemoryCatalog {
    pub async fn upsert(&self, product: Product) { self.products.write().await.insert(product.id, product); }
    pub async fn remove(&self, id: Uuid) { self.products.write().await.remove(&id); }

    /// Applies `f` to a stored product, if present.
    pub async fn update(&self, id: Uuid, f: impl FnOnce(&mut Product)) {
        if let Some(product) = self.products.write().await.get_mut(&id) { f(product); }
    }
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCartStore {
    carts: RwLock<HashMap<Uuid, Cart>>,
}

impl MemoryCartStore {
    pub async fn len(&self) -> usize { self.carts.read().await.len() }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Cart>> {
        Ok(self.carts.read().await.get(&id).cloned())
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Option<Cart>> {
        Ok(self.carts.read().await.values().find(|c| c.owner_id == owner_id).cloned())
    }

    async fn create(&self, owner_id: &str) -> Result<Cart> {
        let mut carts = self.carts.write().await;
        if let Some(existing) = carts.values().find(|c| c.owner_id == owner_id) {
            return Ok(existing.clone());
        }
        let cart = Cart::for_owner(owner_id);
        carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn save(&self, cart: &Cart) -> Result<Cart> {
        let mut carts = self.carts.write().await;
        let stored = carts.get_mut(&cart.id).ok_or_else(|| StoreError::not_found("Cart not found"))?;
        if stored.version != cart.version {
            return Err(StoreError::Conflict("Cart was modified concurrently".to_string()));
        }
        let mut saved = cart.clone();
        saved.version += 1;
        saved.updated_at = Utc::now();
        *stored = saved.clone();
        Ok(saved)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCouponRepository {
    coupons: RwLock<HashMap<CouponCode, Coupon>>,
}

impl MemoryCouponRepository {
    /// Codes are unique; inserting an existing code replaces it.
    pub async fn upsert(&self, coupon: Coupon) { self.coupons.write().await.insert(coupon.code.clone(), coupon); }

    pub async fn get(&self, code: &CouponCode) -> Option<Coupon> { self.coupons.read().await.get(code).cloned() }
}

#[async_trait]
impl CouponRepository for MemoryCouponRepository {
    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>> {
        Ok(self.coupons.read().await.get(code).cloned())
    }

    async fn increment_usage(&self, id: Uuid) -> Result<bool> {
        let mut coupons = self.coupons.write().await;
        let coupon = coupons.values_mut().find(|c| c.id == id).ok_or_else(|| StoreError::not_found("Invalid coupon"))?;
        if !coupon.has_remaining_uses() { return Ok(false); }
        coupon.used_count += 1;
        Ok(true)
    }
}
