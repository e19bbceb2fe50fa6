//! Investment plan catalog.
//!
//! Plans define the allowed principal range and the daily return rate.
//! Rates are stored in basis points so the arithmetic stays integral;
//! `max_amount NULL` means no upper bound.

use crate::error::{LedgerError, LedgerResult};
use crate::money::Amount;
use crate::store::SharedConnection;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentPlan {
    pub id: String,
    pub name: String,
    pub min_amount: Amount,
    pub max_amount: Option<Amount>,
    pub daily_return_bps: i64,
    pub is_active: bool,
}

impl InvestmentPlan {
    pub fn accepts(&self, amount: Amount) -> bool {
        amount >= self.min_amount && self.max_amount.map_or(true, |max| amount <= max)
    }
}

#[derive(Clone)]
pub struct PlanStore {
    conn: SharedConnection,
}

impl PlanStore {
    pub async fn new(conn: SharedConnection) -> LedgerResult<Self> {
        {
            let c = conn.lock().await;
            c.execute(
                "CREATE TABLE IF NOT EXISTS plans (
                    id TEXT PRIMARY KEY,
                    name TEXT UNIQUE NOT NULL,
                    min_amount INTEGER NOT NULL,
                    max_amount INTEGER,
                    daily_return_bps INTEGER NOT NULL,
                    is_active INTEGER NOT NULL DEFAULT 1
                )",
                [],
            )?;
        }
        Ok(Self { conn })
    }

    /// Insert the default tier ladder if the catalog is empty.
    pub async fn seed_defaults(&self) -> LedgerResult<()> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM plans", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(());
        }

        let defaults: [(&str, Amount, Option<Amount>, i64); 5] = [
            ("bronze", 10_000_000, Some(49_000_000), 300),
            ("silver", 50_000_000, Some(99_000_000), 500),
            ("gold", 100_000_000, Some(499_000_000), 800),
            ("platinum", 500_000_000, Some(999_000_000), 1200),
            ("diamond", 1_000_000_000, None, 1500),
        ];

        for (name, min, max, bps) in defaults {
            conn.execute(
                "INSERT INTO plans (id, name, min_amount, max_amount, daily_return_bps, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1)",
                params![Uuid::new_v4().to_string(), name, min, max, bps],
            )?;
        }

        info!("📊 Seeded {} default investment plans", defaults.len());
        Ok(())
    }

    /// Resolve an active plan by id or by name.
    pub async fn find_active(&self, plan: &str) -> LedgerResult<Option<InvestmentPlan>> {
        let conn = self.conn.lock().await;
        let result = conn.query_row(
            "SELECT id, name, min_amount, max_amount, daily_return_bps, is_active
             FROM plans WHERE (id = ?1 OR name = ?1) AND is_active = 1",
            params![plan],
            map_plan,
        );
        match result {
            Ok(plan) => Ok(Some(plan)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_by_id(&self, id: &str) -> LedgerResult<Option<InvestmentPlan>> {
        let conn = self.conn.lock().await;
        let result = conn.query_row(
            "SELECT id, name, min_amount, max_amount, daily_return_bps, is_active
             FROM plans WHERE id = ?1",
            params![id],
            map_plan,
        );
        match result {
            Ok(plan) => Ok(Some(plan)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_active(&self) -> LedgerResult<Vec<InvestmentPlan>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, min_amount, max_amount, daily_return_bps, is_active
             FROM plans WHERE is_active = 1 ORDER BY min_amount ASC",
        )?;
        let rows = stmt.query_map([], map_plan)?;
        let mut plans = Vec::new();
        for row in rows {
            plans.push(row?);
        }
        Ok(plans)
    }

    /// Admin upsert used to adjust the catalog at runtime.
    pub async fn upsert(
        &self,
        name: &str,
        min_amount: Amount,
        max_amount: Option<Amount>,
        daily_return_bps: i64,
        is_active: bool,
    ) -> LedgerResult<InvestmentPlan> {
        if name.trim().is_empty() {
            return Err(LedgerError::Validation("plan name required".to_string()));
        }
        if min_amount <= 0 {
            return Err(LedgerError::Validation(
                "min_amount must be > 0".to_string(),
            ));
        }
        if let Some(max) = max_amount {
            if max < min_amount {
                return Err(LedgerError::Validation(
                    "max_amount must be >= min_amount".to_string(),
                ));
            }
        }
        if daily_return_bps <= 0 {
            return Err(LedgerError::Validation(
                "daily_return_bps must be > 0".to_string(),
            ));
        }

        let conn = self.conn.lock().await;
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO plans (id, name, min_amount, max_amount, daily_return_bps, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                 min_amount = excluded.min_amount,
                 max_amount = excluded.max_amount,
                 daily_return_bps = excluded.daily_return_bps,
                 is_active = excluded.is_active",
            params![
                id,
                name.trim(),
                min_amount,
                max_amount,
                daily_return_bps,
                is_active as i64
            ],
        )?;

        let plan = conn.query_row(
            "SELECT id, name, min_amount, max_amount, daily_return_bps, is_active
             FROM plans WHERE name = ?1",
            params![name.trim()],
            map_plan,
        )?;
        Ok(plan)
    }
}

fn map_plan(row: &Row) -> rusqlite::Result<InvestmentPlan> {
    Ok(InvestmentPlan {
        id: row.get(0)?,
        name: row.get(1)?,
        min_amount: row.get(2)?,
        max_amount: row.get(3)?,
        daily_return_bps: row.get(4)?,
        is_active: row.get::<_, i64>(5)? == 1,
    })
}
