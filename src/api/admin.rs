//! Admin API endpoints.

use axum::extract::{rejection::QueryRejection, Query, State};

use super::{query_params, success, ApiResult};
use crate::models::ExpireQuery;
use crate::service::ExpirySummary;
use crate::AppState;

/// POST /admin/expire-coupons - Run the expiry sweep now.
pub async fn expire_coupons(
    State(state): State<AppState>,
    query: Result<Query<ExpireQuery>, QueryRejection>,
) -> ApiResult<ExpirySummary> {
    let query = query_params(query)?;
    let summary = state.service.expire_stale(query.dry_run).await?;
    success(summary)
}
