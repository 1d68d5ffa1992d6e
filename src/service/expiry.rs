//! Expiry sweep.
//!
//! Re-checks every coupon still marked valid against the vendor's landing page
//! and retires the ones the vendor reports as expired.

use serde::Serialize;

use super::CouponService;
use crate::errors::AppError;
use crate::models::CouponStatus;

const EXPIRED_REASON: &str = "Code expired - vendor page shows the expiry banner";

/// A coupon the sweep retired (or would retire on a dry run).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExpiredCoupon {
    pub id: String,
    pub code: String,
    pub reason: String,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirySummary {
    pub dry_run: bool,
    pub message: String,
    pub total_processed: usize,
    pub expired_count: usize,
    pub expired_coupons: Vec<ExpiredCoupon>,
}

impl CouponService {
    /// Probe all valid coupons and mark the dead ones expired.
    ///
    /// With `dry_run` nothing is written. A coupon that fails to update is
    /// logged and left for the next sweep.
    pub async fn expire_stale(&self, dry_run: bool) -> Result<ExpirySummary, AppError> {
        let candidates = self.repo.list_coupons_by_status(CouponStatus::Valid).await?;
        tracing::info!(count = candidates.len(), dry_run, "Starting expiry sweep");

        let mut expired_coupons = Vec::new();

        for (index, coupon) in candidates.iter().enumerate() {
            if index > 0 && !self.settings.expiry_probe_delay.is_zero() {
                tokio::time::sleep(self.settings.expiry_probe_delay).await;
            }

            if !self.verifier.is_expired(&coupon.code).await {
                tracing::debug!(code = %coupon.code, "Coupon still active");
                continue;
            }

            if dry_run {
                tracing::info!(code = %coupon.code, "Dry run: would expire coupon");
            } else {
                match self.repo.mark_expired(&coupon.id).await {
                    Ok(true) => tracing::info!(code = %coupon.code, "Expired coupon"),
                    Ok(false) => {
                        tracing::info!(code = %coupon.code, "Coupon changed status during sweep");
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(code = %coupon.code, "Failed to expire coupon: {}", e);
                        continue;
                    }
                }
            }

            expired_coupons.push(ExpiredCoupon {
                id: coupon.id.clone(),
                code: coupon.code.clone(),
                reason: EXPIRED_REASON.to_string(),
            });
        }

        let action = if dry_run { "would expire" } else { "expired" };
        let summary = ExpirySummary {
            dry_run,
            message: format!(
                "Processed {} coupons, {} {} coupons",
                candidates.len(),
                action,
                expired_coupons.len()
            ),
            total_processed: candidates.len(),
            expired_count: expired_coupons.len(),
            expired_coupons,
        };
        tracing::info!("{}", summary.message);

        Ok(summary)
    }
}
