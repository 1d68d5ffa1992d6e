//! Database repository for coupon records.
//!
//! Every mutation is a single statement so concurrent requests never
//! read-modify-write the same row.

use chrono::{SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{Coupon, CouponStatus, NewCoupon, Reward, Verification, VoteTally};
use crate::votes::TallyDelta;

const COUPON_COLUMNS: &str = "id, code, status, added_on, last_updated, expired_on, rewards, \
     votes_up, votes_down, submitted_by, verification_result";

/// Current time as an ISO-8601 UTC timestamp with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Database repository for all coupon operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List all coupons, newest first.
    pub async fn list_coupons(&self) -> Result<Vec<Coupon>, AppError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons ORDER BY added_on DESC, id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(coupon_from_row).collect()
    }

    /// List coupons in the given status, oldest first.
    pub async fn list_coupons_by_status(
        &self,
        status: CouponStatus,
    ) -> Result<Vec<Coupon>, AppError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE status = ? ORDER BY added_on");
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(coupon_from_row).collect()
    }

    /// Get a coupon by ID.
    #[cfg(test)]
    pub async fn get_coupon(&self, id: &str) -> Result<Option<Coupon>, AppError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(coupon_from_row).transpose()
    }

    /// Get a coupon by its normalized code.
    pub async fn get_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, AppError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = ?");
        let row = sqlx::query(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(coupon_from_row).transpose()
    }

    /// Create a coupon from a verified submission.
    ///
    /// Fails with `DuplicateCode` carrying the stored record when the code is
    /// already on the board, including when another request won the race.
    pub async fn create_coupon(
        &self,
        submission: &NewCoupon,
        verification: &Verification,
    ) -> Result<Coupon, AppError> {
        if !verification.is_valid {
            return Err(AppError::VerificationFailed {
                message: "Only verified coupon codes can be stored".to_string(),
                verification: verification.clone(),
            });
        }

        let now = timestamp();
        let coupon = Coupon {
            id: uuid::Uuid::new_v4().to_string(),
            code: submission.code.clone(),
            status: CouponStatus::Valid,
            added_on: now.clone(),
            last_updated: now,
            expired_on: None,
            rewards: submission.rewards.clone(),
            votes: VoteTally::default(),
            submitted_by: submission.submitted_by.clone(),
            verification_result: Some(verification.clone()),
        };

        self.insert_coupon(&coupon).await?;
        Ok(coupon)
    }

    /// Insert a fully-formed coupon unless its code already exists.
    pub async fn insert_coupon(&self, coupon: &Coupon) -> Result<(), AppError> {
        let rewards_json = serde_json::to_string(&coupon.rewards)?;
        let verification_json = coupon
            .verification_result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            "INSERT INTO coupons (id, code, status, added_on, last_updated, expired_on, rewards, votes_up, votes_down, submitted_by, verification_result) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&coupon.id)
        .bind(&coupon.code)
        .bind(coupon.status.as_str())
        .bind(&coupon.added_on)
        .bind(&coupon.last_updated)
        .bind(&coupon.expired_on)
        .bind(&rewards_json)
        .bind(coupon.votes.up)
        .bind(coupon.votes.down)
        .bind(&coupon.submitted_by)
        .bind(&verification_json)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let existing = self.get_coupon_by_code(&coupon.code).await?;
                tracing::info!(
                    code = %coupon.code,
                    winner = existing.as_ref().map(|c| c.id.as_str()).unwrap_or("unknown"),
                    "Duplicate coupon submission rejected"
                );
                Err(AppError::DuplicateCode {
                    message: format!("Coupon code {} has already been shared", coupon.code),
                    existing: existing.map(Box::new),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply a tally change atomically and return the updated coupon.
    ///
    /// Counters never drop below zero.
    pub async fn apply_vote(&self, id: &str, delta: TallyDelta) -> Result<Coupon, AppError> {
        let sql = format!(
            "UPDATE coupons SET votes_up = MAX(0, votes_up + ?), votes_down = MAX(0, votes_down + ?), last_updated = ? WHERE id = ? RETURNING {COUPON_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(delta.up)
            .bind(delta.down)
            .bind(timestamp())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref()
            .map(coupon_from_row)
            .transpose()?
            .ok_or_else(|| AppError::NotFound(format!("Coupon {} not found", id)))
    }

    /// Flip a still-valid coupon to expired. Returns false if it was not valid anymore.
    pub async fn mark_expired(&self, id: &str) -> Result<bool, AppError> {
        let now = timestamp();
        let result = sqlx::query(
            "UPDATE coupons SET status = ?, last_updated = ?, expired_on = ? WHERE id = ? AND status = ?",
        )
        .bind(CouponStatus::Expired.as_str())
        .bind(&now)
        .bind(&now)
        .bind(id)
        .bind(CouponStatus::Valid.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

// Helper functions for row conversion

fn coupon_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Coupon, AppError> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    let rewards_str: String = row.get("rewards");
    let verification_str: Option<String> = row.get("verification_result");

    let status = CouponStatus::parse(&status).ok_or_else(|| {
        tracing::error!(id = %id, status = %status, "Stored coupon has an unknown status");
        AppError::Internal(format!("Coupon {} has unknown status '{}'", id, status))
    })?;
    let rewards = parse_rewards(&id, &rewards_str)?;

    Ok(Coupon {
        code: row.get("code"),
        status,
        added_on: row.get("added_on"),
        last_updated: row.get("last_updated"),
        expired_on: row.get("expired_on"),
        rewards,
        votes: VoteTally {
            up: row.get("votes_up"),
            down: row.get("votes_down"),
        },
        submitted_by: row.get("submitted_by"),
        verification_result: verification_str.and_then(|s| serde_json::from_str(&s).ok()),
        id,
    })
}

fn parse_rewards(id: &str, s: &str) -> Result<Vec<Reward>, AppError> {
    serde_json::from_str(s).map_err(|e| {
        tracing::error!(id, "Stored coupon has unreadable rewards: {}", e);
        AppError::Internal(format!("Coupon {} has unreadable rewards", id))
    })
}
