//! Request bodies for the coupon endpoints.
//!
//! Fields whose type is checked by the validation layer are kept as raw JSON so a
//! wrong type surfaces as a validation error instead of a deserialization failure.

use serde::Deserialize;

/// Request body for submitting a new coupon.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AddCouponRequest {
    #[serde(default)]
    pub code: serde_json::Value,
    #[serde(default)]
    pub rewards: serde_json::Value,
    /// Client-generated voter/submitter tag; advisory only
    #[serde(default)]
    pub user_hash: serde_json::Value,
}

/// Request body for casting, switching or retracting a vote.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VoteCouponRequest {
    #[serde(default)]
    pub coupon_id: serde_json::Value,
    #[serde(default)]
    pub vote_type: serde_json::Value,
    #[serde(default)]
    pub user_hash: serde_json::Value,
    #[serde(default)]
    pub previous_vote: serde_json::Value,
}

/// Query string for the expiry sweep endpoint.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExpireQuery {
    #[serde(default)]
    pub dry_run: bool,
}
