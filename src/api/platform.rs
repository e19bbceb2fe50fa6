//! Health, plan catalog, wallet view, account administration, and the admin
//! event feed.

use crate::api::views::{AccountView, PlanView};
use crate::api::{ApiResult, AppState};
use crate::auth::{require_admin, Claims};
use crate::error::LedgerError;
use crate::notifier::LedgerEvent;
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

/// GET /health (public)
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime,
    }))
}

/// GET /plans (public)
pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<PlanView>>> {
    let plans = state.plans.list_active().await?;
    Ok(Json(plans.iter().map(PlanView::from).collect()))
}

/// GET /wallet
pub async fn wallet(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<AccountView>> {
    let account = state
        .accounts
        .get_by_id(&claims.sub)
        .await?
        .ok_or(LedgerError::NotFound("account"))?;
    Ok(Json(AccountView::from(&account)))
}

#[derive(Debug, Deserialize)]
pub struct AccountStatusBody {
    pub disabled: bool,
}

/// PATCH /accounts/:id/status (admin) - soft-disable or re-enable an account.
pub async fn set_account_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<AccountStatusBody>,
) -> ApiResult<Json<AccountView>> {
    require_admin(&claims)?;
    if claims.sub == id {
        return Err(LedgerError::Validation(
            "cannot disable your own account".to_string(),
        )
        .into());
    }

    state.accounts.set_disabled(&id, payload.disabled).await?;
    let account = state
        .accounts
        .get_by_id(&id)
        .await?
        .ok_or(LedgerError::NotFound("account"))?;

    info!(
        "{} Account {} {} by {}",
        if payload.disabled { "🚫" } else { "✅" },
        account.username,
        if payload.disabled { "disabled" } else { "re-enabled" },
        claims.username,
    );
    Ok(Json(AccountView::from(&account)))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// GET /events (admin) - recent ledger event feed.
pub async fn recent_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<Vec<LedgerEvent>>> {
    require_admin(&claims)?;
    Ok(Json(state.notifier.recent(query.limit.unwrap_or(50))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{app_state, claims_for};
    use crate::api::ApiError;
    use crate::auth::models::Role;
    use crate::auth::AuthError;

    #[tokio::test]
    async fn test_admin_can_disable_and_reenable_an_account() {
        let state = app_state().await;
        let admin = state
            .accounts
            .create_account("boss", "boss@example.com", "secret1", Role::Admin)
            .await
            .unwrap();
        let target = state
            .accounts
            .create_account("mallory", "mallory@example.com", "secret1", Role::User)
            .await
            .unwrap();

        let Json(view) = set_account_status(
            State(state.clone()),
            Extension(claims_for(&admin.id, "boss", Role::Admin)),
            Path(target.id.clone()),
            Json(AccountStatusBody { disabled: true }),
        )
        .await
        .unwrap();
        assert!(view.disabled);

        // Disabled accounts fail the login credential check.
        let account = state
            .accounts
            .verify_password("mallory", "secret1")
            .await
            .unwrap()
            .unwrap();
        assert!(account.disabled);

        let Json(view) = set_account_status(
            State(state),
            Extension(claims_for(&admin.id, "boss", Role::Admin)),
            Path(target.id),
            Json(AccountStatusBody { disabled: false }),
        )
        .await
        .unwrap();
        assert!(!view.disabled);
    }

    #[tokio::test]
    async fn test_account_status_rejects_non_admin_and_self() {
        let state = app_state().await;
        let admin = state
            .accounts
            .create_account("boss", "boss@example.com", "secret1", Role::Admin)
            .await
            .unwrap();
        let user = state
            .accounts
            .create_account("peon", "peon@example.com", "secret1", Role::User)
            .await
            .unwrap();

        let err = set_account_status(
            State(state.clone()),
            Extension(claims_for(&user.id, "peon", Role::User)),
            Path(admin.id.clone()),
            Json(AccountStatusBody { disabled: true }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::Forbidden)));

        let err = set_account_status(
            State(state),
            Extension(claims_for(&admin.id, "boss", Role::Admin)),
            Path(admin.id),
            Json(AccountStatusBody { disabled: true }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Ledger(LedgerError::Validation(_))));
    }
}
