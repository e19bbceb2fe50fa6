//! YieldVault server binary.
//!
//! Bootstraps configuration, the SQLite ledger, the two background
//! schedulers, and the HTTP API.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yieldvault_backend::api::{build_router, AppState};
use yieldvault_backend::auth::JwtHandler;
use yieldvault_backend::config::Config;
use yieldvault_backend::ledger::{
    AdEarnings, DepositProcessor, InvestmentLedger, ReferralProgram, WithdrawalProcessor,
};
use yieldvault_backend::middleware::{RateLimitConfig, RateLimitLayer};
use yieldvault_backend::notifier::Notifier;
use yieldvault_backend::scheduler::{
    AccrualScheduler, AutoWithdrawalScheduler, ManualPayoutGateway,
};
use yieldvault_backend::store::{
    open_database, AccountStore, AdStore, DepositStore, InvestmentStore, PlanStore,
    WithdrawalStore,
};

#[derive(Parser, Debug)]
#[command(name = "yieldvault", about = "Investment ledger and accrual engine")]
struct Args {
    /// Listen address (overrides INVEST_BIND_ADDR).
    #[arg(long)]
    bind: Option<String>,

    /// SQLite database file (overrides INVEST_DB_PATH).
    #[arg(long)]
    db: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(db) = args.db {
        config.db_path = db;
    }

    info!("🚀 YieldVault ledger starting");

    let conn = open_database(&config.db_path).context("Failed to open ledger database")?;
    info!("📊 Ledger database: {}", config.db_path.display());

    let accounts = AccountStore::new(conn.clone()).await?;
    let plans = PlanStore::new(conn.clone()).await?;
    let investments = InvestmentStore::new(conn.clone()).await?;
    let withdrawals = WithdrawalStore::new(conn.clone()).await?;
    let deposits = DepositStore::new(conn.clone()).await?;
    let ads = AdStore::new(conn).await?;

    accounts.bootstrap_default_admin().await?;
    plans.seed_defaults().await?;
    ads.seed_defaults().await?;

    let notifier = Notifier::new(config.notify_webhook_url.clone());
    let jwt = Arc::new(JwtHandler::new(config.jwt_secret.clone()));

    let investing = InvestmentLedger::new(
        accounts.clone(),
        plans.clone(),
        investments.clone(),
        notifier.clone(),
    );
    let referrals = ReferralProgram::new(accounts.clone());
    let withdrawal_processor = WithdrawalProcessor::new(
        withdrawals.clone(),
        notifier.clone(),
        config.withdrawal_grace_hours,
    );
    let deposit_processor = DepositProcessor::new(deposits, notifier.clone());
    let earnings = AdEarnings::new(ads, notifier.clone());

    // Background schedulers share the stores with the request handlers; every
    // wallet mutation funnels through the same atomic UPDATE either way.
    AccrualScheduler::new(
        investments,
        notifier.clone(),
        Duration::from_secs(config.accrual_interval_secs),
    )
    .spawn();
    AutoWithdrawalScheduler::new(
        withdrawals,
        notifier.clone(),
        Arc::new(ManualPayoutGateway),
        Duration::from_secs(config.auto_withdrawal_interval_secs),
    )
    .spawn();

    let limiter = RateLimitLayer::new(RateLimitConfig::from_env());
    let cleanup_limiter = limiter.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(300));
        loop {
            ticker.tick().await;
            cleanup_limiter.cleanup();
        }
    });

    let state = AppState {
        accounts,
        plans,
        investing,
        referrals,
        withdrawals: withdrawal_processor,
        deposits: deposit_processor,
        earnings,
        notifier,
        jwt,
        started_at: Utc::now(),
    };
    let app = build_router(state, limiter);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🎯 API server listening on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yieldvault_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
