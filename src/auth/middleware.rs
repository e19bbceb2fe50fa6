//! JWT validation middleware and the admin role gate.

use crate::auth::models::{Claims, Role};
use crate::auth::jwt::JwtHandler;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Validates the bearer token (or `token` query parameter) and stores the
/// claims in request extensions for handlers to read.
pub async fn auth_middleware(
    State(jwt_handler): State<Arc<JwtHandler>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token_from_query = req.uri().query().and_then(|query| {
        query
            .split('&')
            .find(|pair| pair.starts_with("token="))
            .and_then(|pair| pair.split('=').nth(1))
            .map(|t| t.to_string())
    });

    let token_from_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.to_string());

    let token = token_from_header
        .or(token_from_query)
        .ok_or(AuthError::MissingToken)?;

    let claims = jwt_handler
        .validate_token(&token)
        .map_err(|_| AuthError::InvalidToken)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Admin-only gate for decision and listing handlers.
pub fn require_admin(claims: &Claims) -> Result<(), AuthError> {
    if claims.role != Role::Admin {
        return Err(AuthError::Forbidden);
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    InvalidCredentials,
    Forbidden,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid username or password")
            }
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "Admin role required"),
        };

        (status, message).into_response()
    }
}
