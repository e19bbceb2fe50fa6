//! SQLite persistence layer.
//!
//! All stores share one connection behind an async mutex so compound
//! operations (debit + insert, decide + refund) commit as a single
//! transaction. Each store owns its own tables and creates them on startup.

pub mod accounts;
pub mod ads;
pub mod deposits;
pub mod investments;
pub mod plans;
pub mod withdrawals;

pub use accounts::{Account, AccountStore};
pub use ads::{Ad, AdStore, AdWatch};
pub use deposits::{Deposit, DepositStore};
pub use investments::{AccrualOutcome, Investment, InvestmentStore};
pub use plans::{InvestmentPlan, PlanStore};
pub use withdrawals::{Withdrawal, WithdrawalStore};

use crate::error::LedgerResult;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedConnection = Arc<Mutex<Connection>>;

/// Row-mapper helper for RFC 3339 columns. A malformed row surfaces as a
/// column conversion error instead of panicking the handler.
pub(crate) fn column_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Open (or create) the ledger database with WAL enabled.
pub fn open_database(path: &Path) -> LedgerResult<SharedConnection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL").ok();
    conn.pragma_update(None, "synchronous", "NORMAL").ok();
    Ok(Arc::new(Mutex::new(conn)))
}

/// In-memory database for tests.
pub fn open_in_memory() -> LedgerResult<SharedConnection> {
    Ok(Arc::new(Mutex::new(Connection::open_in_memory()?)))
}
