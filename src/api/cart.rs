use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{ApiError, AppState, CurrentUser};
use crate::services::{AddItem, GuestLine, MergeOutcome, UnavailableItem, ValidationResult, ValidationSummary};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(super) struct AddItemRequest {
    product_id: Uuid,
    #[validate(length(min = 1, message = "Color is required"))]
    color: String,
    #[validate(length(min = 1, message = "Size is required"))]
    size: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    quantity: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub(super) struct UpdateQuantityRequest {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub(super) struct MergeRequest {
    #[validate]
    items: Vec<AddItemRequest>,
}

/// Clearing skips validation, so there is no nested cart in the reply.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ClearedCart {
    total: Decimal,
    prices_updated: bool,
    unavailable_items: Vec<UnavailableItem>,
    all_items_available: bool,
}

impl From<AddItemRequest> for AddItem {
    fn from(r: AddItemRequest) -> Self {
        Self { product_id: r.product_id, color: r.color, size: r.size, quantity: r.quantity }
    }
}

pub(super) async fn get_cart(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<ValidationResult>, ApiError> {
    Ok(Json(s.carts.get_cart(&user).await?))
}

pub(super) async fn validate_cart(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<ValidationSummary>, ApiError> {
    Ok(Json(s.carts.validation_summary(&user).await?))
}

pub(super) async fn add_item(
    State(s): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(r): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<ValidationResult>), ApiError> {
    r.validate()?;
    let result = s.carts.add_item(&user, r.into()).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub(super) async fn update_item(
    State(s): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(r): Json<UpdateQuantityRequest>,
) -> Result<Json<ValidationResult>, ApiError> {
    r.validate()?;
    Ok(Json(s.carts.update_item_quantity(&user, item_id, r.quantity).await?))
}

pub(super) async fn remove_item(
    State(s): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ValidationResult>, ApiError> {
    Ok(Json(s.carts.remove_item(&user, item_id).await?))
}

pub(super) async fn clear_cart(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<ClearedCart>, ApiError> {
    let result = s.carts.clear_cart(&user).await?;
    Ok(Json(ClearedCart {
        total: result.total,
        prices_updated: result.prices_updated,
        unavailable_items: result.unavailable_items,
        all_items_available: result.all_items_available,
    }))
}

pub(super) async fn merge_guest_cart(
    State(s): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(r): Json<MergeRequest>,
) -> Result<Json<MergeOutcome>, ApiError> {
    r.validate()?;
    let lines: Vec<GuestLine> = r.items.into_iter().map(Into::into).collect();
    Ok(Json(s.carts.merge_guest_cart(&user, lines).await?))
}
