//! Withdrawal handlers.

use crate::api::views::WithdrawalView;
use crate::api::{ApiError, ApiResult, AppState};
use crate::auth::{require_admin, Claims};
use crate::error::LedgerError;
use crate::store::AccountStore;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequestBody {
    pub amount: f64,
    pub address: String,
    pub network: String,
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub status: String,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminListQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

pub(super) fn parse_decision(status: &str) -> Result<bool, ApiError> {
    match status {
        "approved" => Ok(true),
        "rejected" => Ok(false),
        other => Err(LedgerError::Validation(format!(
            "status must be 'approved' or 'rejected', got '{}'",
            other
        ))
        .into()),
    }
}

/// Resolve owner usernames for admin listings.
pub(super) async fn owner_usernames(
    accounts: &AccountStore,
    owner_ids: impl Iterator<Item = String>,
) -> Result<HashMap<String, String>, LedgerError> {
    let mut usernames = HashMap::new();
    for owner_id in owner_ids {
        if usernames.contains_key(&owner_id) {
            continue;
        }
        if let Some(account) = accounts.get_by_id(&owner_id).await? {
            usernames.insert(owner_id, account.username);
        }
    }
    Ok(usernames)
}

/// POST /withdrawals
pub async fn request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<WithdrawalRequestBody>,
) -> ApiResult<impl IntoResponse> {
    let withdrawal = state
        .withdrawals
        .request(&claims.sub, payload.amount, &payload.address, &payload.network)
        .await?;
    Ok((StatusCode::CREATED, Json(WithdrawalView::from(&withdrawal))))
}

/// GET /withdrawals/mine
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<WithdrawalView>>> {
    let withdrawals = state.withdrawals.my_withdrawals(&claims.sub).await?;
    Ok(Json(withdrawals.iter().map(WithdrawalView::from).collect()))
}

/// PATCH /withdrawals/:id (admin)
pub async fn decide(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<DecisionBody>,
) -> ApiResult<Json<WithdrawalView>> {
    require_admin(&claims)?;
    let approve = parse_decision(&payload.status)?;
    let withdrawal = state
        .withdrawals
        .decide(&claims.sub, &id, approve, payload.note)
        .await?;
    Ok(Json(WithdrawalView::from(&withdrawal)))
}

/// GET /withdrawals (admin)
pub async fn list_all(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<AdminListQuery>,
) -> ApiResult<Json<Vec<WithdrawalView>>> {
    require_admin(&claims)?;
    let withdrawals = state
        .withdrawals
        .all_withdrawals(query.status.as_deref(), query.limit.unwrap_or(200))
        .await?;

    let usernames = owner_usernames(
        &state.accounts,
        withdrawals.iter().map(|w| w.owner_id.clone()),
    )
    .await?;

    Ok(Json(
        withdrawals
            .iter()
            .map(|w| {
                let mut view = WithdrawalView::from(w);
                view.owner_username = usernames.get(&w.owner_id).cloned();
                view
            })
            .collect(),
    ))
}
