//! HTTP surface for the cart, coupon and checkout services.

mod cart;
mod checkout;
mod coupons;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::error::StoreError;
use crate::services::{CartService, CheckoutService, CouponService, ServiceContext};

pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone, Debug)]
pub struct AppState {
    pub carts: CartService,
    pub coupons: CouponService,
    pub checkout: CheckoutService,
}

impl AppState {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { carts: CartService::new(ctx.clone()), coupons: CouponService::new(ctx.clone()), checkout: CheckoutService::new(ctx) }
    }
}

/// Principal set by the upstream gateway.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CurrentUser(v.to_string()))
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", "Authentication required"))
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, error: ErrorBody { code, message: message.into() } }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(m) => Self::new(StatusCode::NOT_FOUND, "not_found", m),
            StoreError::Validation(m) => Self::new(StatusCode::BAD_REQUEST, "validation_error", m),
            StoreError::Conflict(m) => Self::new(StatusCode::CONFLICT, "conflict", m),
            StoreError::Upstream(m) => {
                tracing::error!(error = %m, "upstream failure");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable", "Service temporarily unavailable, please retry")
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let message = first_message(&errors).unwrap_or_else(|| "Invalid request".to_string());
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }
}

/// First failure in field-name order, descending into nested structs and lists.
fn first_message(errors: &ValidationErrors) -> Option<String> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by_key(|(field, _)| **field);
    fields.into_iter().find_map(|(field, kind)| match kind {
        ValidationErrorsKind::Field(errs) => errs
            .first()
            .map(|e| e.message.as_ref().map_or_else(|| format!("{field} is invalid"), ToString::to_string)),
        ValidationErrorsKind::Struct(inner) => first_message(inner),
        ValidationErrorsKind::List(items) => items.values().find_map(|inner| first_message(inner)),
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-cart"})) }))
        .route("/api/v1/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/api/v1/cart/items", post(cart::add_item))
        .route("/api/v1/cart/items/:item_id", put(cart::update_item).delete(cart::remove_item))
        .route("/api/v1/cart/validate", get(cart::validate_cart))
        .route("/api/v1/cart/merge", post(cart::merge_guest_cart))
        .route("/api/v1/coupons/apply", post(coupons::apply_coupon))
        .route("/api/v1/coupons/remove", get(coupons::remove_coupon))
        .route("/api/v1/coupons/affiliate/:code", get(coupons::affiliate))
        .route("/api/v1/checkout/summary", get(checkout::summary))
        .route("/api/v1/checkout/complete", post(checkout::complete))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
