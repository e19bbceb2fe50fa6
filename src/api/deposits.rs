//! Deposit handlers.

use crate::api::views::DepositView;
use crate::api::withdrawals::{owner_usernames, parse_decision, AdminListQuery};
use crate::api::{ApiResult, AppState};
use crate::auth::{require_admin, Claims};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SubmitDepositBody {
    pub amount: f64,
    pub proof_reference: String,
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub status: String,
    pub note: Option<String>,
}

/// POST /deposits
pub async fn submit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitDepositBody>,
) -> ApiResult<impl IntoResponse> {
    let deposit = state
        .deposits
        .submit(&claims.sub, payload.amount, &payload.proof_reference)
        .await?;
    Ok((StatusCode::CREATED, Json(DepositView::from(&deposit))))
}

/// GET /deposits/mine
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<DepositView>>> {
    let deposits = state.deposits.my_deposits(&claims.sub).await?;
    Ok(Json(deposits.iter().map(DepositView::from).collect()))
}

/// PATCH /deposits/:id (admin)
pub async fn decide(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<DecisionBody>,
) -> ApiResult<Json<DepositView>> {
    require_admin(&claims)?;
    let approve = parse_decision(&payload.status)?;
    let deposit = state
        .deposits
        .decide(&claims.sub, &id, approve, payload.note)
        .await?;
    Ok(Json(DepositView::from(&deposit)))
}

/// GET /deposits (admin)
pub async fn list_all(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<AdminListQuery>,
) -> ApiResult<Json<Vec<DepositView>>> {
    require_admin(&claims)?;
    let deposits = state
        .deposits
        .all_deposits(query.status.as_deref(), query.limit.unwrap_or(200))
        .await?;

    let usernames = owner_usernames(
        &state.accounts,
        deposits.iter().map(|d| d.owner_id.clone()),
    )
    .await?;

    Ok(Json(
        deposits
            .iter()
            .map(|d| {
                let mut view = DepositView::from(d);
                view.owner_username = usernames.get(&d.owner_id).cloned();
                view
            })
            .collect(),
    ))
}
