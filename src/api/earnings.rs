//! Earn-by-watching-ads handlers.

use crate::api::views::{AdView, AdWatchView};
use crate::api::{ApiResult, AppState};
use crate::auth::{require_admin, Claims};
use crate::money::from_amount;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct WatchAdRequest {
    pub ad_id: String,
}

#[derive(Debug, Serialize)]
pub struct WatchAdResponse {
    pub ad_title: String,
    pub reward: f64,
    pub new_balance: f64,
}

#[derive(Debug, Deserialize)]
pub struct AdBody {
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub reward: f64,
    pub duration_secs: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// GET /earn/ads - a rotating sample of watchable ads.
pub async fn list_ads(State(state): State<AppState>) -> ApiResult<Json<Vec<AdView>>> {
    let ads = state.earnings.catalog().await?;
    Ok(Json(ads.iter().map(AdView::from).collect()))
}

/// POST /earn/watch - claim an ad's reward.
pub async fn watch(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<WatchAdRequest>,
) -> ApiResult<Json<WatchAdResponse>> {
    let (watch, balance) = state.earnings.watch(&claims.sub, &payload.ad_id).await?;
    Ok(Json(WatchAdResponse {
        ad_title: watch.ad_title,
        reward: from_amount(watch.reward),
        new_balance: from_amount(balance),
    }))
}

/// GET /earn/history - the caller's watch history.
pub async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<AdWatchView>>> {
    let watches = state.earnings.history(&claims.sub).await?;
    Ok(Json(watches.iter().map(AdWatchView::from).collect()))
}

/// GET /earn/admin/ads (admin) - the full catalog, inactive ads included.
pub async fn list_all_ads(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<AdView>>> {
    require_admin(&claims)?;
    let ads = state.earnings.all_ads().await?;
    Ok(Json(ads.iter().map(AdView::from).collect()))
}

/// POST /earn/admin/ads (admin)
pub async fn create_ad(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AdBody>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&claims)?;
    let ad = state
        .earnings
        .create_ad(
            &payload.title,
            &payload.description,
            &payload.video_url,
            payload.reward,
            payload.duration_secs,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(AdView::from(&ad))))
}

/// PATCH /earn/admin/ads/:id (admin) - replace an ad's content and flags.
pub async fn update_ad(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<AdBody>,
) -> ApiResult<Json<AdView>> {
    require_admin(&claims)?;
    let ad = state
        .earnings
        .update_ad(
            &id,
            &payload.title,
            &payload.description,
            &payload.video_url,
            payload.reward,
            payload.duration_secs,
            payload.is_active,
        )
        .await?;
    Ok(Json(AdView::from(&ad)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{app_state, claims_for};
    use crate::api::ApiError;
    use crate::auth::models::Role;
    use crate::auth::AuthError;
    use crate::error::LedgerError;
    use crate::money::to_amount;

    #[tokio::test]
    async fn test_watch_flow_credits_and_blocks_repeats() {
        let state = app_state().await;
        let viewer = state
            .accounts
            .create_account("alice", "alice@example.com", "secret1", Role::User)
            .await
            .unwrap();

        let ad = state
            .earnings
            .create_ad(
                "Spot",
                "A sponsored spot",
                "https://cdn.example/spot.mp4",
                1.2,
                30,
            )
            .await
            .unwrap();

        let Json(response) = watch(
            State(state.clone()),
            Extension(claims_for(&viewer.id, "alice", Role::User)),
            Json(WatchAdRequest { ad_id: ad.id.clone() }),
        )
        .await
        .unwrap();
        assert_eq!(response.ad_title, "Spot");
        assert!((response.new_balance - 1.2).abs() < 1e-9);

        let err = watch(
            State(state.clone()),
            Extension(claims_for(&viewer.id, "alice", Role::User)),
            Json(WatchAdRequest { ad_id: ad.id }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Ledger(LedgerError::Duplicate(_))));

        let account = state.accounts.get_by_id(&viewer.id).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(1.2));

        let Json(history) = history(
            State(state),
            Extension(claims_for(&viewer.id, "alice", Role::User)),
        )
        .await
        .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].ad_title, "Spot");
    }

    #[tokio::test]
    async fn test_catalog_admin_routes_are_gated() {
        let state = app_state().await;
        let user = state
            .accounts
            .create_account("peon", "peon@example.com", "secret1", Role::User)
            .await
            .unwrap();

        let result = create_ad(
            State(state.clone()),
            Extension(claims_for(&user.id, "peon", Role::User)),
            Json(AdBody {
                title: "Nope".to_string(),
                description: "d".to_string(),
                video_url: "https://cdn.example/nope.mp4".to_string(),
                reward: 1.0,
                duration_secs: 15,
                is_active: true,
            }),
        )
        .await;
        assert!(matches!(
            result,
            Err(ApiError::Auth(AuthError::Forbidden))
        ));

        let err = list_all_ads(
            State(state),
            Extension(claims_for(&user.id, "peon", Role::User)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::Forbidden)));
    }
}
