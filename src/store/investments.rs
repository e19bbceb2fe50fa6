//! Investment storage and daily-return accrual.
//!
//! Creation debits the wallet and inserts the investment in one transaction.
//! Accrual is idempotent per (investment, day): a marker row with a
//! deterministic id is inserted first, and the UNIQUE constraint turns any
//! repeat into a no-op before money moves.

use crate::error::{LedgerError, LedgerResult};
use crate::money::{bps_of, Amount};
use crate::store::accounts::AccountStore;
use crate::store::plans::InvestmentPlan;
use crate::store::SharedConnection;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub id: String,
    pub owner_id: String,
    pub plan_id: String,
    pub plan_name: String,
    pub invested_amount: Amount,
    pub daily_return: Amount,
    pub total_returned: Amount,
    pub status: String,
    pub start_date: DateTime<Utc>,
}

/// What a single accrual attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccrualOutcome {
    /// Money moved: `amount` was credited (clamped to the remaining principal).
    Applied { amount: Amount, completed: bool },
    /// This day was already accrued for this investment.
    AlreadyAccrued,
    /// The investment is no longer active.
    Inactive,
}

#[derive(Clone)]
pub struct InvestmentStore {
    conn: SharedConnection,
}

impl InvestmentStore {
    pub async fn new(conn: SharedConnection) -> LedgerResult<Self> {
        {
            let c = conn.lock().await;
            c.execute(
                "CREATE TABLE IF NOT EXISTS investments (
                    id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    plan_id TEXT NOT NULL,
                    plan_name TEXT NOT NULL,
                    invested_amount INTEGER NOT NULL,
                    daily_return INTEGER NOT NULL,
                    total_returned INTEGER NOT NULL DEFAULT 0,
                    status TEXT NOT NULL DEFAULT 'active',
                    start_date TEXT NOT NULL,
                    FOREIGN KEY (owner_id) REFERENCES accounts(id)
                )",
                [],
            )?;
            c.execute(
                "CREATE INDEX IF NOT EXISTS idx_investments_owner ON investments(owner_id)",
                [],
            )?;
            c.execute(
                "CREATE INDEX IF NOT EXISTS idx_investments_status ON investments(status)",
                [],
            )?;
            c.execute(
                "CREATE TABLE IF NOT EXISTS accrual_events (
                    id TEXT PRIMARY KEY,
                    investment_id TEXT NOT NULL,
                    accrual_date TEXT NOT NULL,
                    amount INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE (investment_id, accrual_date),
                    FOREIGN KEY (investment_id) REFERENCES investments(id)
                )",
                [],
            )?;
        }
        Ok(Self { conn })
    }

    /// Debit the principal and insert the investment atomically. The second
    /// element of the result is true when this is the owner's first
    /// investment ever.
    pub async fn insert_with_debit(
        &self,
        owner_id: &str,
        plan: &InvestmentPlan,
        amount: Amount,
    ) -> LedgerResult<(Investment, bool)> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let prior: i64 = tx.query_row(
            "SELECT COUNT(*) FROM investments WHERE owner_id = ?1",
            params![owner_id],
            |row| row.get(0),
        )?;

        AccountStore::apply_delta_on(&tx, owner_id, -amount)?;

        let investment = Investment {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            plan_id: plan.id.clone(),
            plan_name: plan.name.clone(),
            invested_amount: amount,
            daily_return: bps_of(amount, plan.daily_return_bps),
            total_returned: 0,
            status: "active".to_string(),
            start_date: Utc::now(),
        };

        tx.execute(
            "INSERT INTO investments (id, owner_id, plan_id, plan_name, invested_amount,
                                      daily_return, total_returned, status, start_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'active', ?7)",
            params![
                investment.id,
                investment.owner_id,
                investment.plan_id,
                investment.plan_name,
                investment.invested_amount,
                investment.daily_return,
                investment.start_date.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok((investment, prior == 0))
    }

    /// Apply at most one day of returns to an investment.
    ///
    /// The credit is clamped so lifetime payout never exceeds the principal;
    /// the tick that reaches the principal flips the investment to completed.
    pub async fn accrue_once(
        &self,
        investment_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<AccrualOutcome> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let investment = match tx.query_row(
            &format!("SELECT {} FROM investments WHERE id = ?1", INVESTMENT_COLS),
            params![investment_id],
            map_investment,
        ) {
            Ok(inv) => inv,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(LedgerError::NotFound("investment"))
            }
            Err(e) => return Err(e.into()),
        };

        if investment.status != "active" {
            return Ok(AccrualOutcome::Inactive);
        }

        let remaining = (investment.invested_amount - investment.total_returned).max(0);
        let credit = investment.daily_return.min(remaining);

        let event_id = Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!("{}:{}", investment_id, date).as_bytes(),
        )
        .to_string();

        let marker = tx.execute(
            "INSERT INTO accrual_events (id, investment_id, accrual_date, amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event_id,
                investment_id,
                date.to_string(),
                credit,
                Utc::now().to_rfc3339(),
            ],
        );
        match marker {
            Ok(_) => {}
            Err(e) if is_accrual_conflict(&e) => return Ok(AccrualOutcome::AlreadyAccrued),
            Err(e) => return Err(e.into()),
        }

        let new_total = investment.total_returned + credit;
        let completed = new_total >= investment.invested_amount;
        tx.execute(
            "UPDATE investments SET total_returned = ?1, status = ?2 WHERE id = ?3",
            params![
                new_total,
                if completed { "completed" } else { "active" },
                investment_id,
            ],
        )?;

        if credit > 0 {
            AccountStore::apply_delta_on(&tx, &investment.owner_id, credit)?;
        }

        tx.commit()?;
        Ok(AccrualOutcome::Applied {
            amount: credit,
            completed,
        })
    }

    pub async fn get(&self, id: &str) -> LedgerResult<Option<Investment>> {
        let conn = self.conn.lock().await;
        let result = conn.query_row(
            &format!("SELECT {} FROM investments WHERE id = ?1", INVESTMENT_COLS),
            params![id],
            map_investment,
        );
        match result {
            Ok(inv) => Ok(Some(inv)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> LedgerResult<Vec<Investment>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM investments WHERE owner_id = ?1 ORDER BY start_date DESC",
            INVESTMENT_COLS
        ))?;
        let rows = stmt.query_map(params![owner_id], map_investment)?;
        let mut investments = Vec::new();
        for row in rows {
            investments.push(row?);
        }
        Ok(investments)
    }

    pub async fn list_all(&self, limit: usize) -> LedgerResult<Vec<Investment>> {
        let limit = limit.clamp(1, 1000);
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM investments ORDER BY start_date DESC LIMIT ?1",
            INVESTMENT_COLS
        ))?;
        let rows = stmt.query_map(params![limit as i64], map_investment)?;
        let mut investments = Vec::new();
        for row in rows {
            investments.push(row?);
        }
        Ok(investments)
    }

    /// Ids of investments still accruing, for the scheduler sweep.
    pub async fn active_ids(&self) -> LedgerResult<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare_cached("SELECT id FROM investments WHERE status = 'active' ORDER BY start_date ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

const INVESTMENT_COLS: &str = "id, owner_id, plan_id, plan_name, invested_amount, \
     daily_return, total_returned, status, start_date";

fn map_investment(row: &Row) -> rusqlite::Result<Investment> {
    Ok(Investment {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        plan_id: row.get(2)?,
        plan_name: row.get(3)?,
        invested_amount: row.get(4)?,
        daily_return: row.get(5)?,
        total_returned: row.get(6)?,
        status: row.get(7)?,
        start_date: crate::store::column_timestamp(8, &row.get::<_, String>(8)?)?,
    })
}

fn is_accrual_conflict(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("accrual_events")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;
    use crate::money::to_amount;
    use crate::store::plans::PlanStore;
    use crate::store::{open_in_memory, SharedConnection};

    struct Fixture {
        accounts: AccountStore,
        plans: PlanStore,
        investments: InvestmentStore,
    }

    async fn fixture() -> Fixture {
        let conn: SharedConnection = open_in_memory().unwrap();
        let accounts = AccountStore::new(conn.clone()).await.unwrap();
        let plans = PlanStore::new(conn.clone()).await.unwrap();
        plans.seed_defaults().await.unwrap();
        let investments = InvestmentStore::new(conn).await.unwrap();
        Fixture {
            accounts,
            plans,
            investments,
        }
    }

    async fn funded_account(fx: &Fixture, username: &str, balance: f64) -> String {
        let account = fx
            .accounts
            .create_account(
                username,
                &format!("{}@example.com", username),
                "secret1",
                Role::User,
            )
            .await
            .unwrap();
        fx.accounts
            .apply_delta(&account.id, to_amount(balance))
            .await
            .unwrap();
        account.id
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_insert_with_debit_moves_principal() {
        let fx = fixture().await;
        let owner = funded_account(&fx, "alice", 200.0).await;
        let gold = fx.plans.find_active("gold").await.unwrap().unwrap();

        let (investment, first) = fx
            .investments
            .insert_with_debit(&owner, &gold, to_amount(100.0))
            .await
            .unwrap();
        assert!(first);
        assert_eq!(investment.status, "active");
        assert_eq!(investment.daily_return, to_amount(8.0));

        let account = fx.accounts.get_by_id(&owner).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(100.0));

        let (_, first) = fx
            .investments
            .insert_with_debit(&owner, &gold, to_amount(100.0))
            .await
            .unwrap();
        assert!(!first);
    }

    #[tokio::test]
    async fn test_insert_with_debit_insufficient_funds_rolls_back() {
        let fx = fixture().await;
        let owner = funded_account(&fx, "bob", 50.0).await;
        let gold = fx.plans.find_active("gold").await.unwrap().unwrap();

        let err = fx
            .investments
            .insert_with_debit(&owner, &gold, to_amount(100.0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds));

        let account = fx.accounts.get_by_id(&owner).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(50.0));
        assert!(fx.investments.list_by_owner(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_accrue_once_credits_wallet() {
        let fx = fixture().await;
        let owner = funded_account(&fx, "carol", 100.0).await;
        let gold = fx.plans.find_active("gold").await.unwrap().unwrap();
        let (investment, _) = fx
            .investments
            .insert_with_debit(&owner, &gold, to_amount(100.0))
            .await
            .unwrap();

        let outcome = fx
            .investments
            .accrue_once(&investment.id, day("2026-08-20"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            AccrualOutcome::Applied {
                amount: to_amount(8.0),
                completed: false
            }
        );

        let account = fx.accounts.get_by_id(&owner).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(8.0));
        let investment = fx.investments.get(&investment.id).await.unwrap().unwrap();
        assert_eq!(investment.total_returned, to_amount(8.0));
    }

    #[tokio::test]
    async fn test_accrue_same_day_is_noop() {
        let fx = fixture().await;
        let owner = funded_account(&fx, "dave", 100.0).await;
        let gold = fx.plans.find_active("gold").await.unwrap().unwrap();
        let (investment, _) = fx
            .investments
            .insert_with_debit(&owner, &gold, to_amount(100.0))
            .await
            .unwrap();

        fx.investments
            .accrue_once(&investment.id, day("2026-08-20"))
            .await
            .unwrap();
        let second = fx
            .investments
            .accrue_once(&investment.id, day("2026-08-20"))
            .await
            .unwrap();
        assert_eq!(second, AccrualOutcome::AlreadyAccrued);

        let account = fx.accounts.get_by_id(&owner).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(8.0));
    }

    #[tokio::test]
    async fn test_final_accrual_clamps_to_principal() {
        let fx = fixture().await;
        let owner = funded_account(&fx, "erin", 10.0).await;
        // 40% daily so completion lands mid-tick: 4 + 4 + 2.
        let turbo = fx
            .plans
            .upsert("turbo", to_amount(1.0), None, 4000, true)
            .await
            .unwrap();
        let (investment, _) = fx
            .investments
            .insert_with_debit(&owner, &turbo, to_amount(10.0))
            .await
            .unwrap();

        for (date, expected, done) in [
            ("2026-08-20", 4.0, false),
            ("2026-08-21", 4.0, false),
            ("2026-08-22", 2.0, true),
        ] {
            let outcome = fx
                .investments
                .accrue_once(&investment.id, day(date))
                .await
                .unwrap();
            assert_eq!(
                outcome,
                AccrualOutcome::Applied {
                    amount: to_amount(expected),
                    completed: done
                }
            );
        }

        let investment = fx.investments.get(&investment.id).await.unwrap().unwrap();
        assert_eq!(investment.status, "completed");
        assert_eq!(investment.total_returned, investment.invested_amount);

        // Lifetime payout equals principal exactly, and a completed
        // investment accrues nothing further.
        let account = fx.accounts.get_by_id(&owner).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(10.0));
        let after = fx
            .investments
            .accrue_once(&investment.id, day("2026-08-23"))
            .await
            .unwrap();
        assert_eq!(after, AccrualOutcome::Inactive);
        assert!(fx.investments.active_ids().await.unwrap().is_empty());
    }
}
