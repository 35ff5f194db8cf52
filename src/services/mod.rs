//! Cart and coupon services.
//!
//! Every mutation runs under the owner's lock from [`OwnerLocks`], and every
//! collaborator call is bounded by the configured upstream timeout.

pub mod cart_service;
pub mod cart_validator;
pub mod checkout;
pub mod coupon_service;
mod locks;

pub use cart_service::{AddItem, CartService, GuestLine, MergeOutcome, RejectedLine};
pub use cart_validator::{CartValidator, UnavailableItem, ValidationResult, ValidationSummary};
pub use checkout::{CheckoutService, CheckoutSnapshot};
pub use coupon_service::{AffiliateAttribution, CouponApplication, CouponService, CouponSummary};
pub use locks::OwnerLocks;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::aggregates::Cart;
use crate::domain::events::{DomainEvent, EventPublisher};
use crate::error::{Result, StoreError};
use crate::repositories::{CartStore, CouponRepository, ProductCatalog};

pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Collaborators shared by all services.
#[derive(Clone)]
pub struct ServiceContext {
    pub catalog: Arc<dyn ProductCatalog>,
    pub carts: Arc<dyn CartStore>,
    pub coupons: Arc<dyn CouponRepository>,
    pub events: Arc<dyn EventPublisher>,
    pub locks: OwnerLocks,
    pub upstream_timeout: Duration,
}

impl ServiceContext {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        carts: Arc<dyn CartStore>,
        coupons: Arc<dyn CouponRepository>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self { catalog, carts, coupons, events, locks: OwnerLocks::default(), upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT }
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// Runs a collaborator call under the upstream timeout.
    pub(crate) async fn call<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.upstream_timeout, fut).await?
    }

    pub(crate) async fn publish(&self, event: impl Into<DomainEvent>) {
        let event = event.into();
        let subject = event.subject();
        if let Err(e) = self.events.publish(event).await {
            tracing::warn!(%subject, error = %e, "dropping domain event");
        }
    }

    pub(crate) async fn find_or_create_cart(&self, owner_id: &str) -> Result<Cart> {
        match self.call(self.carts.find_by_owner(owner_id)).await? {
            Some(cart) => Ok(cart),
            None => {
                tracing::debug!(owner_id, "creating cart");
                self.call(self.carts.create(owner_id)).await
            }
        }
    }

    pub(crate) async fn existing_cart(&self, owner_id: &str) -> Result<Cart> {
        self.call(self.carts.find_by_owner(owner_id))
            .await?
            .ok_or_else(|| StoreError::not_found("Cart not found"))
    }

    pub(crate) async fn save_cart(&self, cart: &Cart) -> Result<Cart> {
        self.call(self.carts.save(cart)).await
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("locks", &self.locks)
            .field("upstream_timeout", &self.upstream_timeout)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::test_support::Fixture;
    use crate::domain::aggregates::Product;
    use crate::error::{Result, StoreError};
    use crate::repositories::ProductCatalog;

    struct SlowCatalog(Duration);

    #[async_trait]
    impl ProductCatalog for SlowCatalog {
        async fn get_product(&self, _id: Uuid) -> Result<Option<Product>> {
            tokio::time::sleep(self.0).await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_slow_collaborator_becomes_upstream_error() {
        let fx = Fixture::new();
        let mut ctx = fx.ctx.clone().with_upstream_timeout(Duration::from_millis(20));
        ctx.catalog = Arc::new(SlowCatalog(Duration::from_secs(2)));

        let result = ctx.call(ctx.catalog.get_product(Uuid::now_v7())).await;

        assert!(matches!(result, Err(StoreError::Upstream(_))));
        assert!(result.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_call_within_timeout_passes_through() {
        let fx = Fixture::new();
        let product = fx.product(10, &[("M", 1)]).await;
        let ctx = fx.ctx.clone().with_upstream_timeout(Duration::from_millis(500));

        let found = ctx.call(ctx.catalog.get_product(product.id)).await.unwrap();

        assert_eq!(found.map(|p| p.id), Some(product.id));
    }
}
