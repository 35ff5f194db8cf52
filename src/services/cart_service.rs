//! Cart mutations. Each one runs under the owner's lock, persists, and then
//! re-runs full validation so callers always see reconciled state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cart_validator::{CartValidator, ValidationResult, ValidationSummary};
use super::ServiceContext;
use crate::domain::aggregates::{Cart, LineKey, VariantSelection};
use crate::domain::events::CartEvent;
use crate::domain::value_objects::Quantity;
use crate::error::{Result, StoreError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItem {
    pub product_id: Uuid,
    pub color: String,
    pub size: String,
    /// Defaults to one.
    pub quantity: Option<u32>,
}

/// A line carried over from a signed-out session.
pub type GuestLine = AddItem;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedLine {
    pub product_id: Uuid,
    pub color: String,
    pub size: String,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    #[serde(flatten)]
    pub validation: ValidationResult,
    pub rejected: Vec<RejectedLine>,
}

fn parse_quantity(raw: u32) -> Result<Quantity> {
    Quantity::new(raw).map_err(|e| StoreError::validation(e.to_string()))
}

#[derive(Clone, Debug)]
pub struct CartService {
    ctx: ServiceContext,
    validator: CartValidator,
}

impl CartService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { validator: CartValidator::new(ctx.clone()), ctx }
    }

    /// The owner's cart, created on first access, validated.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: &str) -> Result<ValidationResult> {
        let _guard = self.ctx.locks.lock(user_id).await;
        let cart = self.ctx.find_or_create_cart(user_id).await?;
        Ok(self.validator.reconcile(cart).await?.result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn validation_summary(&self, user_id: &str) -> Result<ValidationSummary> {
        Ok(self.get_cart(user_id).await?.summary())
    }

    #[tracing::instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn add_item(&self, user_id: &str, request: AddItem) -> Result<ValidationResult> {
        let _guard = self.ctx.locks.lock(user_id).await;
        let cart = self.ctx.find_or_create_cart(user_id).await?;
        let cart = self.add_to(cart, &request).await?;
        Ok(self.validator.reconcile(cart).await?.result)
    }

    /// Adds guest lines one by one with the usual rules. Lines breaking a
    /// business rule are skipped and reported; any other failure aborts.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn merge_guest_cart(&self, user_id: &str, lines: Vec<GuestLine>) -> Result<MergeOutcome> {
        let _guard = self.ctx.locks.lock(user_id).await;
        let mut cart = self.ctx.find_or_create_cart(user_id).await?;
        let mut rejected = Vec::new();
        for line in lines {
            match self.add_to(cart.clone(), &line).await {
                Ok(saved) => cart = saved,
                Err(StoreError::Validation(reason)) => rejected.push(RejectedLine {
                    product_id: line.product_id, color: line.color, size: line.size, reason,
                }),
                Err(e) => return Err(e),
            }
        }
        let validation = self.validator.reconcile(cart).await?.result;
        Ok(MergeOutcome { validation, rejected })
    }

    async fn add_to(&self, mut cart: Cart, request: &AddItem) -> Result<Cart> {
        let quantity = parse_quantity(request.quantity.unwrap_or(1))?;
        let product = self
            .ctx
            .call(self.ctx.catalog.get_product(request.product_id))
            .await?
            .ok_or_else(|| StoreError::validation("Product not found"))?;
        if !product.is_active {
            return Err(StoreError::validation("Product is not available"));
        }
        let variant = product
            .variant(&request.color)
            .ok_or_else(|| StoreError::validation("Selected color is not available"))?;
        let stock = variant
            .size(&request.size)
            .ok_or_else(|| StoreError::validation("Selected size is not available"))?
            .stock;
        let selection = VariantSelection::new(request.color.clone(), request.size.clone());
        let key = LineKey { product_id: product.id, variant: selection.clone() };
        match cart.find_line(&key).map(|line| line.quantity.value()) {
            Some(in_cart) if in_cart.saturating_add(quantity.value()) > stock => {
                return Err(StoreError::validation(format!(
                    "Only {} more item(s) can be added. You already have {in_cart} in your cart",
                    stock.saturating_sub(in_cart)
                )));
            }
            None if stock < quantity.value() => {
                return Err(StoreError::validation(format!("Only {stock} item(s) available in this size")));
            }
            _ => {}
        }

        let item_id = cart.add_line(&product, selection, quantity, Utc::now());
        let cart = self.ctx.save_cart(&cart).await?;
        tracing::info!(cart_id = %cart.id, %item_id, quantity = quantity.value(), "added cart item");
        self.ctx
            .publish(CartEvent::ItemAdded { cart_id: cart.id, item_id, product_id: product.id, quantity: quantity.value() })
            .await;
        Ok(cart)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_item_quantity(&self, user_id: &str, item_id: Uuid, quantity: u32) -> Result<ValidationResult> {
        let quantity = parse_quantity(quantity)?;
        let _guard = self.ctx.locks.lock(user_id).await;
        let mut cart = self.ctx.existing_cart(user_id).await?;
        let item = cart.item(item_id).cloned().ok_or_else(|| StoreError::not_found("Item not found in cart"))?;

        let product = self
            .ctx
            .call(self.ctx.catalog.get_product(item.product_id))
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| StoreError::validation("Product no longer available"))?;
        let stock = product
            .stock_for(&item.variant.color, &item.variant.size)
            .map_err(|reason| StoreError::validation(reason.message()))?;
        if stock < quantity.value() {
            return Err(StoreError::validation(format!("Only {stock} item(s) available in this size")));
        }

        cart.set_quantity(item_id, quantity, Utc::now())
            .map_err(|e| StoreError::not_found(e.to_string()))?;
        let cart = self.ctx.save_cart(&cart).await?;
        tracing::info!(cart_id = %cart.id, %item_id, quantity = quantity.value(), "updated cart item quantity");
        self.ctx.publish(CartEvent::QuantityUpdated { cart_id: cart.id, item_id, quantity: quantity.value() }).await;
        Ok(self.validator.reconcile(cart).await?.result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, user_id: &str, item_id: Uuid) -> Result<ValidationResult> {
        let _guard = self.ctx.locks.lock(user_id).await;
        let mut cart = self.ctx.existing_cart(user_id).await?;
        cart.remove_item(item_id).map_err(|e| StoreError::not_found(e.to_string()))?;
        let cart = self.ctx.save_cart(&cart).await?;
        tracing::info!(cart_id = %cart.id, %item_id, "removed cart item");
        self.ctx.publish(CartEvent::ItemRemoved { cart_id: cart.id, item_id }).await;
        Ok(self.validator.reconcile(cart).await?.result)
    }

    /// Empties the cart. Nothing is left to validate, so the zeroed result
    /// is returned directly.
    #[tracing::instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: &str) -> Result<ValidationResult> {
        let _guard = self.ctx.locks.lock(user_id).await;
        let mut cart = self.ctx.find_or_create_cart(user_id).await?;
        cart.clear();
        let cart = self.ctx.save_cart(&cart).await?;
        tracing::info!(cart_id = %cart.id, "cleared cart");
        self.ctx.publish(CartEvent::Cleared { cart_id: cart.id }).await;
        Ok(ValidationResult::empty(cart))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Product;
    use crate::repositories::CartStore;
    use crate::services::test_support::{dec, Fixture};

    fn add(product: &Product, size: &str, quantity: Option<u32>) -> AddItem {
        AddItem { product_id: product.id, color: "black".into(), size: size.into(), quantity }
    }

    fn reason(result: Result<ValidationResult>) -> String {
        match result {
            Err(StoreError::Validation(reason)) => reason,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_add_item_creates_cart_and_totals() {
        let fx = Fixture::new();
        let product = fx.product(250, &[("M", 5)]).await;
        let service = CartService::new(fx.ctx.clone());

        let result = service.add_item("user-1", add(&product, "M", None)).await.unwrap();

        assert_eq!(result.cart.owner_id, "user-1");
        assert_eq!(result.cart.items.len(), 1);
        assert_eq!(result.cart.items[0].quantity.value(), 1);
        assert_eq!(result.total, dec(250));
        assert!(result.all_items_available);
        assert_eq!(fx.events.subjects(), vec!["cart.item_added".to_string()]);
    }

    #[tokio::test]
    async fn test_add_item_rejections() {
        let fx = Fixture::new();
        let product = fx.product(250, &[("M", 3)]).await;
        let mut inactive = Product::create("Old", dec(10)).with_variant("black", &[("M", 3)]);
        inactive.is_active = false;
        fx.catalog.upsert(inactive.clone()).await;
        let service = CartService::new(fx.ctx.clone());

        let missing = AddItem { product_id: Uuid::now_v7(), ..add(&product, "M", None) };
        assert_eq!(reason(service.add_item("u", missing).await), "Product not found");
        assert_eq!(reason(service.add_item("u", add(&inactive, "M", None)).await), "Product is not available");
        let red = AddItem { color: "red".into(), ..add(&product, "M", None) };
        assert_eq!(reason(service.add_item("u", red).await), "Selected color is not available");
        assert_eq!(reason(service.add_item("u", add(&product, "XL", None)).await), "Selected size is not available");
        assert_eq!(reason(service.add_item("u", add(&product, "M", Some(4))).await), "Only 3 item(s) available in this size");
        assert_eq!(reason(service.add_item("u", add(&product, "M", Some(0))).await), "Quantity must be at least 1");
    }

    #[tokio::test]
    async fn test_incremental_add_respects_stock() {
        let fx = Fixture::new();
        let product = fx.product(100, &[("M", 5)]).await;
        let service = CartService::new(fx.ctx.clone());

        service.add_item("user-1", add(&product, "M", Some(3))).await.unwrap();
        let err = reason(service.add_item("user-1", add(&product, "M", Some(3))).await);
        assert_eq!(err, "Only 2 more item(s) can be added. You already have 3 in your cart");

        let err = reason(service.add_item("user-1", add(&product, "M", Some(6))).await);
        assert_eq!(err, "Only 2 more item(s) can be added. You already have 3 in your cart");

        let result = service.add_item("user-1", add(&product, "M", Some(2))).await.unwrap();
        assert_eq!(result.cart.items.len(), 1);
        assert_eq!(result.cart.items[0].quantity.value(), 5);
        assert_eq!(result.total, dec(500));
    }

    #[tokio::test]
    async fn test_update_quantity_checks_live_stock() {
        let fx = Fixture::new();
        let product = fx.product(100, &[("M", 5)]).await;
        let service = CartService::new(fx.ctx.clone());
        let item_id = service.add_item("user-1", add(&product, "M", Some(1))).await.unwrap().cart.items[0].id;
        fx.catalog.update(product.id, |p| p.variants[0].sizes[0].stock = 2).await;

        let err = reason(service.update_item_quantity("user-1", item_id, 3).await);
        assert_eq!(err, "Only 2 item(s) available in this size");

        let result = service.update_item_quantity("user-1", item_id, 2).await.unwrap();
        assert_eq!(result.cart.items[0].quantity.value(), 2);
        assert_eq!(result.total, dec(200));

        let missing = service.update_item_quantity("user-1", Uuid::now_v7(), 1).await;
        assert_eq!(missing, Err(StoreError::not_found("Item not found in cart")));
    }

    #[tokio::test]
    async fn test_remove_unknown_item_leaves_cart() {
        let fx = Fixture::new();
        let product = fx.product(100, &[("M", 5)]).await;
        let service = CartService::new(fx.ctx.clone());
        let before = service.add_item("user-1", add(&product, "M", Some(1))).await.unwrap().cart;

        let result = service.remove_item("user-1", Uuid::now_v7()).await;

        assert_eq!(result, Err(StoreError::not_found("Item not found in cart")));
        let stored = fx.carts.find_by_id(before.id).await.unwrap().unwrap();
        assert_eq!(stored.items, before.items);
        assert_eq!(stored.version, before.version);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let fx = Fixture::new();
        let product = fx.product(100, &[("M", 5), ("L", 5)]).await;
        let service = CartService::new(fx.ctx.clone());
        service.add_item("user-1", add(&product, "M", Some(1))).await.unwrap();
        let cart = service.add_item("user-1", add(&product, "L", Some(2))).await.unwrap().cart;

        let result = service.remove_item("user-1", cart.items[0].id).await.unwrap();
        assert_eq!(result.cart.items.len(), 1);
        assert_eq!(result.total, dec(200));

        let cleared = service.clear_cart("user-1").await.unwrap();
        assert!(cleared.cart.items.is_empty());
        assert_eq!(cleared.total, dec(0));
        assert!(cleared.all_items_available);
    }

    #[tokio::test]
    async fn test_get_cart_creates_once() {
        let fx = Fixture::new();
        let service = CartService::new(fx.ctx.clone());
        let a = service.get_cart("user-1").await.unwrap();
        let b = service.get_cart("user-1").await.unwrap();
        assert_eq!(a.cart.id, b.cart.id);
        assert_eq!(fx.carts.len().await, 1);
        assert!(service.validation_summary("user-1").await.unwrap().all_items_available);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let fx = Fixture::new();
        let product = fx.product(10, &[("M", 100)]).await;
        let service = CartService::new(fx.ctx.clone());

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let service = service.clone();
                let request = add(&product, "M", Some(1));
                tokio::spawn(async move { service.add_item("user-1", request).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let result = service.get_cart("user-1").await.unwrap();
        assert_eq!(result.cart.items[0].quantity.value(), 10);
    }

    #[tokio::test]
    async fn test_merge_guest_cart_collects_rejections() {
        let fx = Fixture::new();
        let product = fx.product(100, &[("M", 2)]).await;
        let service = CartService::new(fx.ctx.clone());

        let outcome = service
            .merge_guest_cart("user-1", vec![add(&product, "M", Some(2)), add(&product, "S", Some(1)), add(&product, "M", Some(1))])
            .await
            .unwrap();

        assert_eq!(outcome.validation.total, dec(200));
        assert_eq!(outcome.rejected.len(), 2);
        assert_eq!(outcome.rejected[0].reason, "Selected size is not available");
        assert!(outcome.rejected[1].reason.starts_with("Only 0 more item(s)"));
    }
}
