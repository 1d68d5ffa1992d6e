//! Input validation for coupon submissions and votes.
//!
//! Request bodies arrive as loosely-typed JSON; everything here turns them into
//! the typed values the store accepts, or a `Validation` error.

use serde_json::Value;

use crate::errors::AppError;
use crate::models::{AddCouponRequest, NewCoupon, Reward, VoteCouponRequest};
use crate::votes::VoteType;

/// Longest accepted coupon code after normalization.
pub const MAX_CODE_LEN: usize = 50;
/// Most rewards a single coupon may list.
pub const MAX_REWARDS: usize = 20;
pub const MAX_REWARD_TYPE_LEN: usize = 50;
pub const MAX_COUPON_ID_LEN: usize = 100;
pub const MAX_USER_HASH_LEN: usize = 100;

/// Submitter recorded when the client sends no user hash.
pub const ANONYMOUS: &str = "anonymous";

/// A vote request after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteCommand {
    pub coupon_id: String,
    pub vote: VoteType,
    pub previous: Option<VoteType>,
    pub user_hash: Option<String>,
}

/// Normalize a coupon code into its uniqueness key.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Validate a whole submission.
pub fn validate_submission(
    request: &AddCouponRequest,
    max_reward_amount: f64,
) -> Result<NewCoupon, AppError> {
    if is_missing(&request.code) || is_missing(&request.rewards) {
        return Err(AppError::Validation(
            "Missing required fields: code and rewards".to_string(),
        ));
    }

    let code = validate_code(&request.code)?;
    let rewards = validate_rewards(&request.rewards, max_reward_amount)?;
    let submitted_by =
        validate_user_hash(&request.user_hash)?.unwrap_or_else(|| ANONYMOUS.to_string());

    Ok(NewCoupon {
        code,
        rewards,
        submitted_by,
    })
}

/// Validate and normalize a coupon code.
pub fn validate_code(value: &Value) -> Result<String, AppError> {
    let Value::String(raw) = value else {
        return Err(invalid_code());
    };

    let code = normalize_code(raw);
    if code.is_empty() || code.chars().count() > MAX_CODE_LEN {
        return Err(invalid_code());
    }

    Ok(code)
}

/// Validate the reward list against the count limit and the amount cap.
pub fn validate_rewards(value: &Value, max_amount: f64) -> Result<Vec<Reward>, AppError> {
    let Value::Array(entries) = value else {
        return Err(AppError::Validation("Invalid rewards format".to_string()));
    };

    if entries.is_empty() {
        return Err(AppError::Validation(
            "At least one reward is required".to_string(),
        ));
    }
    if entries.len() > MAX_REWARDS {
        return Err(AppError::Validation(format!(
            "A coupon can list at most {MAX_REWARDS} rewards"
        )));
    }

    entries
        .iter()
        .map(|entry| validate_reward(entry, max_amount))
        .collect()
}

fn validate_reward(entry: &Value, max_amount: f64) -> Result<Reward, AppError> {
    let kind = match entry.get("type") {
        Some(Value::String(kind)) => kind.trim(),
        _ => return Err(invalid_reward()),
    };
    if kind.is_empty() || kind.chars().count() > MAX_REWARD_TYPE_LEN {
        return Err(invalid_reward());
    }

    let amount = match entry.get("amount") {
        Some(Value::Number(amount)) => amount,
        _ => return Err(invalid_reward()),
    };
    match amount.as_f64() {
        Some(n) if n > 0.0 && n <= max_amount => {}
        _ => return Err(invalid_reward()),
    }

    Ok(Reward {
        kind: kind.to_string(),
        amount: amount.clone(),
    })
}

/// Validate the optional user hash. Empty and absent both mean anonymous.
pub fn validate_user_hash(value: &Value) -> Result<Option<String>, AppError> {
    match value {
        Value::Null => Ok(None),
        Value::String(hash) if hash.is_empty() => Ok(None),
        Value::String(hash) if hash.chars().count() <= MAX_USER_HASH_LEN => Ok(Some(hash.clone())),
        _ => Err(AppError::Validation("Invalid user hash format".to_string())),
    }
}

/// Validate a vote request.
pub fn validate_vote(request: &VoteCouponRequest) -> Result<VoteCommand, AppError> {
    let vote = match &request.vote_type {
        Value::String(s) => VoteType::parse(s),
        _ => None,
    };
    let coupon_id = match &request.coupon_id {
        Value::String(id) if !id.is_empty() => Some(id),
        _ => None,
    };
    let (Some(coupon_id), Some(vote)) = (coupon_id, vote) else {
        return Err(AppError::Validation(
            "Invalid couponId or voteType (must be \"up\" or \"down\")".to_string(),
        ));
    };

    if coupon_id.chars().count() > MAX_COUPON_ID_LEN {
        return Err(AppError::Validation("Invalid coupon ID format".to_string()));
    }

    let previous = match &request.previous_vote {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(VoteType::parse(s).ok_or_else(invalid_previous_vote)?),
        _ => return Err(invalid_previous_vote()),
    };

    let user_hash = validate_user_hash(&request.user_hash)?;

    Ok(VoteCommand {
        coupon_id: coupon_id.clone(),
        vote,
        previous,
        user_hash,
    })
}

fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn invalid_code() -> AppError {
    AppError::Validation("Invalid coupon code format".to_string())
}

fn invalid_reward() -> AppError {
    AppError::Validation("Invalid reward data".to_string())
}

fn invalid_previous_vote() -> AppError {
    AppError::Validation("previousVote must be \"up\" or \"down\"".to_string())
}
