//! Ledger error taxonomy.
//!
//! Every financial operation returns one of these; the HTTP layer maps them to
//! status codes in a single place. Storage failures keep their detail for the
//! server log but surface to callers as a generic persistence failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub enum LedgerError {
    /// Bad input shape or range. Rejected before any mutation.
    Validation(String),
    /// Requested delta would drive a wallet balance negative.
    InsufficientFunds,
    /// Referenced account/plan/entity does not exist.
    NotFound(&'static str),
    /// Attempt to decide an entity that is no longer pending.
    IllegalTransition(String),
    /// Unique constraint hit (username, email, referral code).
    Duplicate(String),
    /// Infrastructure failure; detail stays server-side.
    Persistence(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Validation(msg) => write!(f, "validation: {}", msg),
            LedgerError::InsufficientFunds => write!(f, "insufficient wallet balance"),
            LedgerError::NotFound(what) => write!(f, "{} not found", what),
            LedgerError::IllegalTransition(msg) => write!(f, "illegal transition: {}", msg),
            LedgerError::Duplicate(msg) => write!(f, "duplicate: {}", msg),
            LedgerError::Persistence(msg) => write!(f, "persistence failure: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Persistence(e.to_string())
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            LedgerError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            LedgerError::InsufficientFunds => (
                StatusCode::BAD_REQUEST,
                "insufficient_funds",
                "Insufficient wallet balance".to_string(),
            ),
            LedgerError::NotFound(what) => {
                (StatusCode::NOT_FOUND, "not_found", format!("{} not found", what))
            }
            LedgerError::IllegalTransition(msg) => {
                (StatusCode::CONFLICT, "illegal_transition", msg.clone())
            }
            LedgerError::Duplicate(msg) => (StatusCode::CONFLICT, "duplicate", msg.clone()),
            LedgerError::Persistence(detail) => {
                error!("💥 Persistence failure: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "persistence_error",
                    "Internal storage error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}
