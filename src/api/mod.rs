//! HTTP surface: DTOs, handlers per concern, and router assembly.

pub mod auth;
pub mod deposits;
pub mod earnings;
pub mod investments;
pub mod platform;
pub mod referrals;
pub mod routes;
pub mod views;
pub mod withdrawals;

pub use routes::{build_router, AppState};

use crate::auth::AuthError;
use crate::error::LedgerError;
use axum::response::{IntoResponse, Response};

/// Handler-level error: either a ledger failure or an auth/role failure.
/// Both already know how to render themselves.
#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    Auth(AuthError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        ApiError::Ledger(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Ledger(e) => e.into_response(),
            ApiError::Auth(e) => e.into_response(),
        }
    }
}
