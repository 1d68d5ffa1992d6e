//! Coupon model matching the front-end coupon card.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a coupon on the board.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus {
    Valid,
    Expired,
    Verified,
}

impl CouponStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponStatus::Valid => "valid",
            CouponStatus::Expired => "expired",
            CouponStatus::Verified => "verified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "valid" => Some(CouponStatus::Valid),
            "expired" => Some(CouponStatus::Expired),
            "verified" => Some(CouponStatus::Verified),
            _ => None,
        }
    }
}

/// A single in-game reward granted by a coupon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reward {
    #[serde(rename = "type")]
    pub kind: String,
    /// Kept as a JSON number so integral amounts round-trip without a fraction.
    pub amount: serde_json::Number,
}

/// Up/down vote counters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub up: i64,
    pub down: i64,
}

/// Outcome of asking the vendor to redeem a code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub is_valid: bool,
    pub message: String,
}

impl Verification {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
        }
    }
}

/// A shared coupon code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: String,
    /// Normalized code, unique across the board
    pub code: String,
    pub status: CouponStatus,
    pub added_on: String,
    pub last_updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired_on: Option<String>,
    pub rewards: Vec<Reward>,
    pub votes: VoteTally,
    pub submitted_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_result: Option<Verification>,
}

/// A validated submission, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCoupon {
    pub code: String,
    pub rewards: Vec<Reward>,
    pub submitted_by: String,
}
