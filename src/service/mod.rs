//! Coupon service.
//!
//! Transport-agnostic home of the add/list/vote/expire operations. HTTP handlers
//! (and anything else that fronts the board) only translate requests into calls
//! on [`CouponService`] and its results back into responses.

mod expiry;

pub use expiry::*;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{AddCouponRequest, Coupon, Verification, VoteCouponRequest};
use crate::validation::{validate_submission, validate_vote};
use crate::verifier::Verifier;
use crate::votes::{reconcile, resulting_choice};

const REJECTED_CODE_MESSAGE: &str = "Invalid coupon code. Please double-check the spelling - \
     this code may be expired, invalid, or region-specific.";

/// Verification recorded when vendor checks are switched off.
pub const SKIPPED_VERIFICATION_MESSAGE: &str = "Verification skipped";

/// Tunables the service reads from [`Config`].
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub require_verification: bool,
    pub max_reward_amount: f64,
    pub expiry_probe_delay: Duration,
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            require_verification: config.require_verification,
            max_reward_amount: config.max_reward_amount,
            expiry_probe_delay: config.expiry_probe_delay,
        }
    }
}

/// A freshly stored coupon together with the vendor's answer.
#[derive(Debug, Clone)]
pub struct AddedCoupon {
    pub coupon: Coupon,
    pub verification: Verification,
}

pub struct CouponService {
    repo: Repository,
    verifier: Arc<dyn Verifier>,
    settings: ServiceSettings,
}

impl CouponService {
    pub fn new(repo: Repository, verifier: Arc<dyn Verifier>, settings: ServiceSettings) -> Self {
        Self {
            repo,
            verifier,
            settings,
        }
    }

    /// Validate, verify and store a submitted coupon.
    pub async fn add_coupon(&self, request: &AddCouponRequest) -> Result<AddedCoupon, AppError> {
        let submission = validate_submission(request, self.settings.max_reward_amount)?;

        let verification = if self.settings.require_verification {
            self.verifier.verify(&submission.code).await
        } else {
            Verification::accepted(SKIPPED_VERIFICATION_MESSAGE)
        };

        if !verification.is_valid {
            tracing::info!(
                code = %submission.code,
                reason = %verification.message,
                "Coupon rejected by vendor"
            );
            return Err(AppError::VerificationFailed {
                message: REJECTED_CODE_MESSAGE.to_string(),
                verification,
            });
        }

        let coupon = self.repo.create_coupon(&submission, &verification).await?;
        tracing::info!(
            id = %coupon.id,
            code = %coupon.code,
            submitted_by = %coupon.submitted_by,
            "Coupon added"
        );

        Ok(AddedCoupon {
            coupon,
            verification,
        })
    }

    /// All coupons, newest first.
    pub async fn list_coupons(&self) -> Result<Vec<Coupon>, AppError> {
        self.repo.list_coupons().await
    }

    /// Record, switch or retract a vote.
    ///
    /// The previous choice is whatever the client says it was; nothing here
    /// ties a vote to a verified voter.
    pub async fn vote(&self, request: &VoteCouponRequest) -> Result<Coupon, AppError> {
        let command = validate_vote(request)?;
        let delta = reconcile(command.previous, command.vote);

        let coupon = self.repo.apply_vote(&command.coupon_id, delta).await?;
        tracing::info!(
            id = %coupon.id,
            vote = command.vote.as_str(),
            previous = command.previous.map(|v| v.as_str()).unwrap_or("none"),
            now = resulting_choice(command.previous, command.vote)
                .map(|v| v.as_str())
                .unwrap_or("none"),
            user_hash = command.user_hash.as_deref().unwrap_or("anonymous"),
            up = coupon.votes.up,
            down = coupon.votes.down,
            "Vote applied"
        );

        Ok(coupon)
    }
}
