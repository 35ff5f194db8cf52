use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{ApiError, AppState, CurrentUser};
use crate::domain::value_objects::MAX_COUPON_CODE_LEN;
use crate::services::{AffiliateAttribution, CouponApplication};

#[derive(Debug, Deserialize, Validate)]
pub(super) struct ApplyCouponRequest {
    #[validate(length(min = 1, message = "Coupon code is required"), custom = "fits_code_length")]
    code: String,
}

fn fits_code_length(code: &str) -> Result<(), ValidationError> {
    if code.trim().chars().count() <= MAX_COUPON_CODE_LEN {
        return Ok(());
    }
    let mut error = ValidationError::new("too_long");
    error.message = Some(format!("Coupon code must be at most {MAX_COUPON_CODE_LEN} characters").into());
    Err(error)
}

#[derive(Debug, Serialize)]
pub(super) struct RemovedCoupon {
    success: bool,
}

pub(super) async fn apply_coupon(
    State(s): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(r): Json<ApplyCouponRequest>,
) -> Result<Json<CouponApplication>, ApiError> {
    r.validate()?;
    Ok(Json(s.coupons.apply_coupon(&r.code, &user).await?))
}

pub(super) async fn remove_coupon(State(s): State<AppState>, CurrentUser(user): CurrentUser) -> Result<Json<RemovedCoupon>, ApiError> {
    let success = s.coupons.remove_coupon(&user).await?;
    Ok(Json(RemovedCoupon { success }))
}

pub(super) async fn affiliate(State(s): State<AppState>, Path(code): Path<String>) -> Result<Json<AffiliateAttribution>, ApiError> {
    Ok(Json(s.coupons.affiliate_attribution(&code).await?))
}
