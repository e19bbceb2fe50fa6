//! Application state and router assembly.

use crate::auth::{auth_middleware, JwtHandler};
use crate::ledger::{
    AdEarnings, DepositProcessor, InvestmentLedger, ReferralProgram, WithdrawalProcessor,
};
use crate::middleware::{rate_limit_middleware, request_logging, RateLimitLayer};
use crate::notifier::Notifier;
use crate::store::{AccountStore, PlanStore};
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use super::{auth as auth_api, deposits, earnings, investments, platform, referrals, withdrawals};

#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountStore,
    pub plans: PlanStore,
    pub investing: InvestmentLedger,
    pub referrals: ReferralProgram,
    pub withdrawals: WithdrawalProcessor,
    pub deposits: DepositProcessor,
    pub earnings: AdEarnings,
    pub notifier: Notifier,
    pub jwt: Arc<JwtHandler>,
    pub started_at: DateTime<Utc>,
}

/// Build the full application router: public routes, authenticated routes
/// (admin gating happens in the handlers), request logging, rate limiting,
/// permissive CORS.
pub fn build_router(state: AppState, limiter: RateLimitLayer) -> Router {
    let public_routes = Router::new()
        .route("/health", get(platform::health))
        .route("/plans", get(platform::list_plans))
        .route("/auth/register", post(auth_api::register))
        .route("/auth/login", post(auth_api::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/me", get(auth_api::me))
        .route("/wallet", get(platform::wallet))
        .route("/investments", post(investments::create).get(investments::list_all))
        .route("/investments/mine", get(investments::list_mine))
        .route("/withdrawals", post(withdrawals::request).get(withdrawals::list_all))
        .route("/withdrawals/mine", get(withdrawals::list_mine))
        .route("/withdrawals/:id", patch(withdrawals::decide))
        .route("/deposits", post(deposits::submit).get(deposits::list_all))
        .route("/deposits/mine", get(deposits::list_mine))
        .route("/deposits/:id", patch(deposits::decide))
        .route("/referrals/apply-code", post(referrals::apply_code))
        .route("/referrals/summary", get(referrals::summary))
        .route("/earn/ads", get(earnings::list_ads))
        .route("/earn/watch", post(earnings::watch))
        .route("/earn/history", get(earnings::history))
        .route(
            "/earn/admin/ads",
            get(earnings::list_all_ads).post(earnings::create_ad),
        )
        .route("/earn/admin/ads/:id", patch(earnings::update_ad))
        .route("/accounts/:id/status", patch(platform::set_account_status))
        .route("/events", get(platform::recent_events))
        .route_layer(middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.jwt.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive())
}
