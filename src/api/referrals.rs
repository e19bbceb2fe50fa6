//! Referral program handlers.

use crate::api::{ApiResult, AppState};
use crate::auth::Claims;
use crate::ledger::ReferralSummary;
use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ApplyCodeBody {
    pub referral_code: String,
}

#[derive(Debug, Serialize)]
pub struct ApplyCodeResponse {
    pub referrer_username: String,
}

/// POST /referrals/apply-code
pub async fn apply_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ApplyCodeBody>,
) -> ApiResult<Json<ApplyCodeResponse>> {
    let referrer = state
        .referrals
        .apply_code(&claims.sub, &payload.referral_code)
        .await?;
    Ok(Json(ApplyCodeResponse {
        referrer_username: referrer.username,
    }))
}

/// GET /referrals/summary
pub async fn summary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ReferralSummary>> {
    Ok(Json(state.referrals.summary(&claims.sub).await?))
}
