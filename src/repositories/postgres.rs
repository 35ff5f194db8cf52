//! PostgreSQL implementations. Carts are stored as one row per owner with
//! the line items embedded as JSONB.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::{CartStore, CouponRepository, ProductCatalog};
use crate::domain::aggregates::{AppliedCoupon, Cart, CartItem, Coupon, DiscountType, Product, Variant};
use crate::domain::value_objects::CouponCode;
use crate::error::{Result, StoreError};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price: Decimal,
    discounted_price: Option<Decimal>,
    category: Option<String>,
    is_active: bool,
    variants: Json<Vec<Variant>>,
}

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    owner_id: String,
    items: Json<Vec<CartItem>>,
    coupon: Option<Json<AppliedCoupon>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    discount_type: String,
    value: Option<Decimal>,
    min_cart_value: Option<Decimal>,
    max_discount_amount: Option<Decimal>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    usage_limit: Option<i32>,
    used_count: i32,
    user_specific: Option<String>,
    product_specific: Vec<Uuid>,
    category_specific: Vec<String>,
    is_active: bool,
    is_affiliate_link: bool,
    affiliate_user: Option<String>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id, name: row.name, price: row.price, discounted_price: row.discounted_price,
            category: row.category, is_active: row.is_active, variants: row.variants.0,
        }
    }
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: row.id, owner_id: row.owner_id, items: row.items.0, coupon: row.coupon.map(|c| c.0),
            version: row.version, created_at: row.created_at, updated_at: row.updated_at,
        }
    }
}

impl TryFrom<CouponRow> for Coupon {
    type Error = StoreError;

    fn try_from(row: CouponRow) -> Result<Self> {
        let code = CouponCode::new(row.code).map_err(|e| StoreError::upstream(format!("stored coupon code: {e}")))?;
        Ok(Self {
            id: row.id,
            code,
            discount_type: parse_discount_type(&row.discount_type),
            value: row.value,
            min_cart_value: row.min_cart_value,
            max_discount_amount: row.max_discount_amount,
            start_date: row.start_date,
            end_date: row.end_date,
            usage_limit: row.usage_limit.map(|v| u32::try_from(v).unwrap_or(0)),
            used_count: u32::try_from(row.used_count).unwrap_or(0),
            user_specific: row.user_specific,
            product_specific: row.product_specific,
            category_specific: row.category_specific,
            is_active: row.is_active,
            is_affiliate_link: row.is_affiliate_link,
            affiliate_user: row.affiliate_user,
        })
    }
}

fn parse_discount_type(raw: &str) -> DiscountType {
    match raw {
        "percentage" => DiscountType::Percentage,
        "fixed" => DiscountType::Fixed,
        "free_shipping" => DiscountType::FreeShipping,
        _ => DiscountType::Unknown,
    }
}

#[derive(Clone)]
pub struct PgProductCatalog { db: PgPool }

impl PgProductCatalog {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl ProductCatalog for PgProductCatalog {
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, price, discounted_price, category, is_active, variants FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Product::from))
    }
}

#[derive(Clone)]
pub struct PgCartStore { db: PgPool }

impl PgCartStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

const CART_COLUMNS: &str = "id, owner_id, items, coupon, version, created_at, updated_at";

#[async_trait]
impl CartStore for PgCartStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(&format!("SELECT {CART_COLUMNS} FROM carts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Cart::from))
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(&format!("SELECT {CART_COLUMNS} FROM carts WHERE owner_id = $1"))
            .bind(owner_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Cart::from))
    }

    async fn create(&self, owner_id: &str) -> Result<Cart> {
        sqlx::query("INSERT INTO carts (id, owner_id, items, version, created_at, updated_at) VALUES ($1, $2, '[]'::jsonb, 0, NOW(), NOW()) ON CONFLICT (owner_id) DO NOTHING")
            .bind(Uuid::now_v7())
            .bind(owner_id)
            .execute(&self.db)
            .await?;
        self.find_by_owner(owner_id)
            .await?
            .ok_or_else(|| StoreError::upstream("cart vanished after insert"))
    }

    async fn save(&self, cart: &Cart) -> Result<Cart> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "UPDATE carts SET items = $3, coupon = $4, version = version + 1, updated_at = NOW() \
             WHERE id = $1 AND version = $2 RETURNING {CART_COLUMNS}"
        ))
        .bind(cart.id)
        .bind(cart.version)
        .bind(Json(&cart.items))
        .bind(cart.coupon.as_ref().map(Json))
        .fetch_optional(&self.db)
        .await?;

        if let Some(row) = row {
            return Ok(row.into());
        }
        match self.find_by_id(cart.id).await? {
            Some(_) => Err(StoreError::Conflict("Cart was modified concurrently".to_string())),
            None => Err(StoreError::not_found("Cart not found")),
        }
    }
}

#[derive(Clone)]
pub struct PgCouponRepository { db: PgPool }

impl PgCouponRepository {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[async_trait]
impl CouponRepository for PgCouponRepository {
    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(
            "SELECT id, code, discount_type, value, min_cart_value, max_discount_amount, start_date, end_date, \
             usage_limit, used_count, user_specific, product_specific, category_specific, is_active, \
             is_affiliate_link, affiliate_user FROM coupons WHERE code = $1",
        )
        .bind(code.as_str())
        .fetch_optional(&self.db)
        .await?;
        row.map(Coupon::try_from).transpose()
    }

    async fn increment_usage(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE coupons SET used_count = used_count + 1 \
             WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)",
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}


/// Round trips against a live database. Run with
/// `DATABASE_URL=postgres://... cargo test -- --ignored`.
#[cfg(test)]
mod pg_tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::domain::value_objects::Quantity;

    async fn pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a scratch database");
        let db = PgPoolOptions::new().max_connections(2).connect(&url).await.unwrap();
        sqlx::migrate!("./migrations").run(&db).await.unwrap();
        db
    }

    fn owner() -> String { format!("pg-test-{}", Uuid::now_v7()) }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_create_is_idempotent_per_owner() {
        let store = PgCartStore::new(pool().await);
        let owner = owner();

        let first = store.create(&owner).await.unwrap();
        let second = store.create(&owner).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.version, 0);
        assert!(second.items.is_empty());
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_save_bumps_version_and_rejects_stale_writes() {
        let db = pool().await;
        let store = PgCartStore::new(db.clone());
        let product = Product::create("Tee", Decimal::new(1999, 2)).with_variant("black", &[("M", 5)]);
        sqlx::query("INSERT INTO products (id, name, price, is_active, variants) VALUES ($1, $2, $3, TRUE, $4)")
            .bind(product.id)
            .bind(&product.name)
            .bind(product.price)
            .bind(Json(&product.variants))
            .execute(&db)
            .await
            .unwrap();
        let found = PgProductCatalog::new(db).get_product(product.id).await.unwrap();
        assert_eq!(found, Some(product.clone()));

        let mut cart = store.create(&owner()).await.unwrap();
        cart.add_line(&product, crate::domain::aggregates::VariantSelection::new("black", "M"), Quantity::ONE, Utc::now());
        let saved = store.save(&cart).await.unwrap();
        assert_eq!(saved.version, cart.version + 1);
        assert_eq!(saved.items, cart.items);

        let stale = store.save(&cart).await;
        assert!(matches!(stale, Err(StoreError::Conflict(_))));

        let missing = store.save(&Cart::for_owner(owner())).await;
        assert_eq!(missing, Err(StoreError::not_found("Cart not found")));
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_increment_usage_stops_at_limit() {
        let db = pool().await;
        let repo = PgCouponRepository::new(db.clone());
        let id = Uuid::now_v7();
        let code = format!("PG{}", &id.simple().to_string()[..12]).to_uppercase();
        sqlx::query("INSERT INTO coupons (id, code, discount_type, value, usage_limit) VALUES ($1, $2, 'fixed', 5, 1)")
            .bind(id)
            .bind(&code)
            .execute(&db)
            .await
            .unwrap();

        assert!(repo.increment_usage(id).await.unwrap());
        assert!(!repo.increment_usage(id).await.unwrap());

        let coupon = repo.find_by_code(&CouponCode::new(code).unwrap()).await.unwrap().unwrap();
        assert_eq!(coupon.used_count, 1);
        assert_eq!(coupon.discount_type, DiscountType::Fixed);
    }
}
