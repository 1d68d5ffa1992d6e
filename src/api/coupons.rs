//! Coupon API endpoints.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Serialize;

use super::{created, json_body, success, ApiResult};
use crate::models::{AddCouponRequest, Coupon, Verification, VoteCouponRequest};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CouponAdded {
    pub coupon: Coupon,
    pub verification: Verification,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CouponList {
    pub coupons: Vec<Coupon>,
}

#[derive(Debug, Serialize)]
pub struct VoteRecorded {
    pub coupon: Coupon,
    pub message: String,
}

/// POST /add-coupon - Submit a new coupon code.
pub async fn add_coupon(
    State(state): State<AppState>,
    payload: Result<Json<AddCouponRequest>, JsonRejection>,
) -> ApiResult<CouponAdded> {
    let request = json_body(payload)?;
    let added = state.service.add_coupon(&request).await?;

    created(CouponAdded {
        coupon: added.coupon,
        verification: added.verification,
        message: "Coupon added successfully and verified as valid!".to_string(),
    })
}

/// GET /get-coupons - List all coupons, newest first.
pub async fn get_coupons(State(state): State<AppState>) -> ApiResult<CouponList> {
    let coupons = state.service.list_coupons().await?;
    success(CouponList { coupons })
}

/// PUT /vote-coupon - Cast, switch or retract a vote.
pub async fn vote_coupon(
    State(state): State<AppState>,
    payload: Result<Json<VoteCouponRequest>, JsonRejection>,
) -> ApiResult<VoteRecorded> {
    let request = json_body(payload)?;
    let coupon = state.service.vote(&request).await?;

    success(VoteRecorded {
        coupon,
        message: "Vote recorded successfully".to_string(),
    })
}
