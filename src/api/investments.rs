//! Investment handlers.

use crate::api::views::InvestmentView;
use crate::api::withdrawals::owner_usernames;
use crate::api::{ApiResult, AppState};
use crate::auth::{require_admin, Claims};
use crate::error::LedgerError;
use crate::money::from_amount;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateInvestmentRequest {
    pub plan: String,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct CreateInvestmentResponse {
    pub investment: InvestmentView,
    pub updated_balance: f64,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// POST /investments
pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateInvestmentRequest>,
) -> ApiResult<impl IntoResponse> {
    let investment = state
        .investing
        .create_investment(&claims.sub, &payload.plan, payload.amount)
        .await?;

    let account = state
        .accounts
        .get_by_id(&claims.sub)
        .await?
        .ok_or(LedgerError::NotFound("account"))?;

    Ok((
        StatusCode::CREATED,
        Json(CreateInvestmentResponse {
            investment: InvestmentView::from(&investment),
            updated_balance: from_amount(account.wallet_balance),
        }),
    ))
}

/// GET /investments/mine
pub async fn list_mine(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<InvestmentView>>> {
    let investments = state.investing.my_investments(&claims.sub).await?;
    Ok(Json(investments.iter().map(InvestmentView::from).collect()))
}

/// GET /investments (admin)
pub async fn list_all(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<InvestmentView>>> {
    require_admin(&claims)?;
    let investments = state
        .investing
        .all_investments(query.limit.unwrap_or(200))
        .await?;

    let usernames = owner_usernames(
        &state.accounts,
        investments.iter().map(|i| i.owner_id.clone()),
    )
    .await?;

    Ok(Json(
        investments
            .iter()
            .map(|i| {
                let mut view = InvestmentView::from(i);
                view.owner_username = usernames.get(&i.owner_id).cloned();
                view
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{app_state, claims_for};
    use crate::auth::models::Role;
    use crate::money::to_amount;

    #[tokio::test]
    async fn test_admin_listing_resolves_owner_usernames() {
        let state = app_state().await;
        let owner = state
            .accounts
            .create_account("ivy", "ivy@example.com", "secret1", Role::User)
            .await
            .unwrap();
        state
            .accounts
            .apply_delta(&owner.id, to_amount(200.0))
            .await
            .unwrap();
        state
            .investing
            .create_investment(&owner.id, "gold", 100.0)
            .await
            .unwrap();

        let admin = state
            .accounts
            .create_account("boss", "boss@example.com", "secret1", Role::Admin)
            .await
            .unwrap();

        let Json(views) = list_all(
            State(state.clone()),
            Extension(claims_for(&admin.id, "boss", Role::Admin)),
            Query(ListQuery { limit: None }),
        )
        .await
        .unwrap();

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].owner_id, owner.id);
        assert_eq!(views[0].owner_username.as_deref(), Some("ivy"));

        // The per-user listing stays username-free.
        let Json(mine) = list_mine(
            State(state),
            Extension(claims_for(&owner.id, "ivy", Role::User)),
        )
        .await
        .unwrap();
        assert!(mine[0].owner_username.is_none());
    }
}
