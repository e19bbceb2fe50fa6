//! Runtime configuration, sourced from environment variables with sane
//! defaults so a bare `cargo run` works out of the box.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Listen address for the HTTP server.
    pub bind_addr: String,
    /// Secret used to sign and verify JWTs.
    pub jwt_secret: String,
    /// How often the accrual scheduler wakes up (seconds).
    pub accrual_interval_secs: u64,
    /// How often the auto-withdrawal scheduler wakes up (seconds).
    pub auto_withdrawal_interval_secs: u64,
    /// Pending withdrawals older than this are auto-processed (hours).
    pub withdrawal_grace_hours: i64,
    /// Optional webhook that receives ledger event notifications.
    pub notify_webhook_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            db_path: resolve_db_path(),
            bind_addr: std::env::var("INVEST_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-me".to_string()),
            accrual_interval_secs: std::env::var("ACCRUAL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            auto_withdrawal_interval_secs: std::env::var("AUTO_WITHDRAWAL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            withdrawal_grace_hours: std::env::var("WITHDRAWAL_GRACE_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }
}

/// Database location: `INVEST_DB_PATH` wins, otherwise a file next to the
/// crate so repeated runs from any working directory hit the same ledger.
fn resolve_db_path() -> PathBuf {
    if let Ok(p) = std::env::var("INVEST_DB_PATH") {
        if !p.trim().is_empty() {
            return PathBuf::from(p);
        }
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("yieldvault.db")
}
