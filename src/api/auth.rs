//! Registration and login handlers.

use crate::api::views::AccountView;
use crate::api::{ApiResult, AppState};
use crate::auth::models::{Claims, LoginRequest, RegisterRequest, Role};
use crate::auth::AuthError;
use crate::error::LedgerError;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_in: usize,
    pub account: AccountView,
}

/// POST /auth/register
///
/// Creates the account, optionally binds it to a referrer, and returns a
/// fresh token. The referral code is validated before the account exists so a
/// bad code fails the whole registration.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Some(code) = payload.referral_code.as_deref() {
        let code = code.trim().to_uppercase();
        if !code.is_empty()
            && state.accounts.get_by_referral_code(&code).await?.is_none()
        {
            return Err(LedgerError::NotFound("referral code").into());
        }
    }

    let account = state
        .accounts
        .create_account(&payload.username, &payload.email, &payload.password, Role::User)
        .await?;

    if let Some(code) = payload.referral_code.as_deref() {
        if !code.trim().is_empty() {
            state.referrals.apply_code(&account.id, code).await?;
        }
    }

    // Re-read so the response carries the referrer binding.
    let account = state
        .accounts
        .get_by_id(&account.id)
        .await?
        .ok_or(LedgerError::NotFound("account"))?;

    let (token, expires_in) = state
        .jwt
        .generate_token(&account)
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;

    info!("👤 Account registered: {}", account.username);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            expires_in,
            account: AccountView::from(&account),
        }),
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let account = state
        .accounts
        .verify_password(&payload.username, &payload.password)
        .await?
        .ok_or_else(|| {
            warn!("❌ Failed login attempt: {}", payload.username);
            AuthError::InvalidCredentials
        })?;

    if account.disabled {
        return Err(AuthError::InvalidCredentials.into());
    }

    let (token, expires_in) = state
        .jwt
        .generate_token(&account)
        .map_err(|e| LedgerError::Persistence(e.to_string()))?;

    info!("🔑 Login: {}", account.username);
    Ok(Json(AuthResponse {
        token,
        expires_in,
        account: AccountView::from(&account),
    }))
}

/// GET /auth/me
pub async fn me(
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
