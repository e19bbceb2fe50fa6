//! Withdrawal storage and state machine.
//!
//! Funds are reserved the moment a request is accepted: the wallet is debited
//! and the row sits in `pending` until an admin (or the auto-processor)
//! decides it. Rejection refunds in the same transaction that flips the
//! status, so no decision can pay out or refund twice.

use crate::error::{LedgerError, LedgerResult};
use crate::money::Amount;
use crate::store::accounts::AccountStore;
use crate::store::SharedConnection;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: String,
    pub owner_id: String,
    pub amount: Amount,
    pub address: String,
    pub network: String,
    pub status: String,
    pub admin_note: String,
    pub requested_at: DateTime<Utc>,
    pub auto_process_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
}

#[derive(Clone)]
pub struct WithdrawalStore {
    conn: SharedConnection,
}

impl WithdrawalStore {
    pub async fn new(conn: SharedConnection) -> LedgerResult<Self> {
        {
            let c = conn.lock().await;
            c.execute(
                "CREATE TABLE IF NOT EXISTS withdrawals (
                    id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    amount INTEGER NOT NULL,
                    address TEXT NOT NULL,
                    network TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'pending',
                    admin_note TEXT NOT NULL DEFAULT '',
                    requested_at TEXT NOT NULL,
                    auto_process_at INTEGER NOT NULL,
                    decided_at TEXT,
                    decided_by TEXT,
                    FOREIGN KEY (owner_id) REFERENCES accounts(id)
                )",
                [],
            )?;
            c.execute(
                "CREATE INDEX IF NOT EXISTS idx_withdrawals_owner ON withdrawals(owner_id)",
                [],
            )?;
            c.execute(
                "CREATE INDEX IF NOT EXISTS idx_withdrawals_due
                 ON withdrawals(status, auto_process_at)",
                [],
            )?;
        }
        Ok(Self { conn })
    }

    /// Debit the wallet and insert a pending withdrawal atomically. The
    /// request becomes eligible for auto-processing after `grace_hours`.
    pub async fn request_with_reserve(
        &self,
        owner_id: &str,
        amount: Amount,
        address: &str,
        network: &str,
        grace_hours: i64,
    ) -> LedgerResult<Withdrawal> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        AccountStore::apply_delta_on(&tx, owner_id, -amount)?;

        let requested_at = Utc::now();
        let withdrawal = Withdrawal {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            amount,
            address: address.to_string(),
            network: network.to_string(),
            status: "pending".to_string(),
            admin_note: String::new(),
            requested_at,
            auto_process_at: requested_at + Duration::hours(grace_hours),
            decided_at: None,
            decided_by: None,
        };

        tx.execute(
            "INSERT INTO withdrawals (id, owner_id, amount, address, network,
                                      status, admin_note, requested_at, auto_process_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', '', ?6, ?7)",
            params![
                withdrawal.id,
                withdrawal.owner_id,
                withdrawal.amount,
                withdrawal.address,
                withdrawal.network,
                withdrawal.requested_at.to_rfc3339(),
                withdrawal.auto_process_at.timestamp(),
            ],
        )?;

        tx.commit()?;
        Ok(withdrawal)
    }

    /// Decide a pending withdrawal. Approval leaves the reserved funds gone;
    /// rejection refunds them in the same transaction. Deciding anything that
    /// is not pending is a conflict.
    pub async fn decide(
        &self,
        id: &str,
        approve: bool,
        note: &str,
        decided_by: &str,
    ) -> LedgerResult<Withdrawal> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let current = match tx.query_row(
            &format!("SELECT {} FROM withdrawals WHERE id = ?1", WITHDRAWAL_COLS),
            params![id],
            map_withdrawal,
        ) {
            Ok(w) => w,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(LedgerError::NotFound("withdrawal"))
            }
            Err(e) => return Err(e.into()),
        };

        let status = if approve { "approved" } else { "rejected" };
        let decided_at = Utc::now();
        let rows = tx.execute(
            "UPDATE withdrawals
             SET status = ?1, admin_note = ?2, decided_at = ?3, decided_by = ?4
             WHERE id = ?5 AND status = 'pending'",
            params![status, note, decided_at.to_rfc3339(), decided_by, id],
        )?;
        if rows == 0 {
            return Err(LedgerError::IllegalTransition(format!(
                "withdrawal is already {}",
                current.status
            )));
        }

        if !approve {
            AccountStore::apply_delta_on(&tx, &current.owner_id, current.amount)?;
        }

        tx.commit()?;
        Ok(Withdrawal {
            status: status.to_string(),
            admin_note: note.to_string(),
            decided_at: Some(decided_at),
            decided_by: Some(decided_by.to_string()),
            ..current
        })
    }

    pub async fn get(&self, id: &str) -> LedgerResult<Option<Withdrawal>> {
        let conn = self.conn.lock().await;
        let result = conn.query_row(
            &format!("SELECT {} FROM withdrawals WHERE id = ?1", WITHDRAWAL_COLS),
            params![id],
            map_withdrawal,
        );
        match result {
            Ok(w) => Ok(Some(w)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> LedgerResult<Vec<Withdrawal>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM withdrawals WHERE owner_id = ?1 ORDER BY requested_at DESC",
            WITHDRAWAL_COLS
        ))?;
        let rows = stmt.query_map(params![owner_id], map_withdrawal)?;
        let mut withdrawals = Vec::new();
        for row in rows {
            withdrawals.push(row?);
        }
        Ok(withdrawals)
    }

    pub async fn list_all(
        &self,
        status: Option<&str>,
        limit: usize,
    ) -> LedgerResult<Vec<Withdrawal>> {
        let limit = limit.clamp(1, 1000);
        let conn = self.conn.lock().await;
        let mut withdrawals = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {} FROM withdrawals WHERE status = ?1
                     ORDER BY requested_at DESC LIMIT ?2",
                    WITHDRAWAL_COLS
                ))?;
                let rows = stmt.query_map(params![status, limit as i64], map_withdrawal)?;
                for row in rows {
                    withdrawals.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {} FROM withdrawals ORDER BY requested_at DESC LIMIT ?1",
                    WITHDRAWAL_COLS
                ))?;
                let rows = stmt.query_map(params![limit as i64], map_withdrawal)?;
                for row in rows {
                    withdrawals.push(row?);
                }
            }
        }
        Ok(withdrawals)
    }

    /// Pending withdrawals whose grace period has elapsed.
    pub async fn list_due(&self, now: DateTime<Utc>) -> LedgerResult<Vec<Withdrawal>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM withdrawals
             WHERE status = 'pending' AND auto_process_at <= ?1
             ORDER BY auto_process_at ASC",
            WITHDRAWAL_COLS
        ))?;
        let rows = stmt.query_map(params![now.timestamp()], map_withdrawal)?;
        let mut due = Vec::new();
        for row in rows {
            due.push(row?);
        }
        Ok(due)
    }
}

const WITHDRAWAL_COLS: &str = "id, owner_id, amount, address, network, status, \
     admin_note, requested_at, auto_process_at, decided_at, decided_by";

fn map_withdrawal(row: &Row) -> rusqlite::Result<Withdrawal> {
    Ok(Withdrawal {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        amount: row.get(2)?,
        address: row.get(3)?,
        network: row.get(4)?,
        status: row.get(5)?,
        admin_note: row.get(6)?,
        requested_at: crate::store::column_timestamp(7, &row.get::<_, String>(7)?)?,
        auto_process_at: DateTime::from_timestamp(row.get::<_, i64>(8)?, 0).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                8,
                rusqlite::types::Type::Integer,
                "timestamp out of range".into(),
            )
        })?,
        decided_at: row
            .get::<_, Option<String>>(9)?
            .map(|s| crate::store::column_timestamp(9, &s))
            .transpose()?,
        decided_by: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;
    use crate::money::to_amount;
    use crate::store::{open_in_memory, SharedConnection};

    struct Fixture {
        accounts: AccountStore,
        withdrawals: WithdrawalStore,
    }

    async fn fixture() -> Fixture {
        let conn: SharedConnection = open_in_memory().unwrap();
        let accounts = AccountStore::new(conn.clone()).await.unwrap();
        let withdrawals = WithdrawalStore::new(conn).await.unwrap();
        Fixture {
            accounts,
            withdrawals,
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

    #[tokio::test]
    async fn test_request_reserves_funds() {
        let fx = fixture().await;
        let owner = funded_account(&fx, "alice", 100.0).await;

        let withdrawal = fx
            .withdrawals
            .request_with_reserve(&owner, to_amount(40.0), "0xabc", "erc20", 24)
            .await
            .unwrap();
        assert_eq!(withdrawal.status, "pending");
        assert_eq!(
            withdrawal.auto_process_at,
            withdrawal.requested_at + Duration::hours(24)
        );

        let account = fx.accounts.get_by_id(&owner).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(60.0));
    }

    #[tokio::test]
    async fn test_request_insufficient_funds_inserts_nothing() {
        let fx = fixture().await;
        let owner = funded_account(&fx, "bob", 10.0).await;

        let err = fx
            .withdrawals
            .request_with_reserve(&owner, to_amount(20.0), "0xabc", "erc20", 24)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds));
        assert!(fx.withdrawals.list_by_owner(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reject_refunds_reserved_amount() {
        let fx = fixture().await;
        let owner = funded_account(&fx, "carol", 100.0).await;
        let withdrawal = fx
            .withdrawals
            .request_with_reserve(&owner, to_amount(30.0), "0xabc", "erc20", 24)
            .await
            .unwrap();

        let decided = fx
            .withdrawals
            .decide(&withdrawal.id, false, "suspicious address", "admin-1")
            .await
            .unwrap();
        assert_eq!(decided.status, "rejected");
        assert_eq!(decided.decided_by.as_deref(), Some("admin-1"));

        let account = fx.accounts.get_by_id(&owner).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(100.0));
    }

    #[tokio::test]
    async fn test_approve_keeps_funds_out_of_wallet() {
        let fx = fixture().await;
        let owner = funded_account(&fx, "dave", 100.0).await;
        let withdrawal = fx
            .withdrawals
            .request_with_reserve(&owner, to_amount(30.0), "0xabc", "erc20", 24)
            .await
            .unwrap();

        fx.withdrawals
            .decide(&withdrawal.id, true, "paid out", "admin-1")
            .await
            .unwrap();

        let account = fx.accounts.get_by_id(&owner).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(70.0));
    }

    #[tokio::test]
    async fn test_decide_twice_is_conflict() {
        let fx = fixture().await;
        let owner = funded_account(&fx, "erin", 100.0).await;
        let withdrawal = fx
            .withdrawals
            .request_with_reserve(&owner, to_amount(30.0), "0xabc", "erc20", 24)
            .await
            .unwrap();

        fx.withdrawals
            .decide(&withdrawal.id, false, "first", "admin-1")
            .await
            .unwrap();
        let err = fx
            .withdrawals
            .decide(&withdrawal.id, true, "second", "admin-1")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::IllegalTransition(_)));

        // The refund from the first decision must not be repeatable.
        let account = fx.accounts.get_by_id(&owner).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(100.0));
    }

    #[tokio::test]
    async fn test_list_due_respects_grace_period() {
        let fx = fixture().await;
        let owner = funded_account(&fx, "frank", 100.0).await;

        let immediate = fx
            .withdrawals
            .request_with_reserve(&owner, to_amount(10.0), "0xabc", "erc20", 0)
            .await
            .unwrap();
        let later = fx
            .withdrawals
            .request_with_reserve(&owner, to_amount(10.0), "0xdef", "erc20", 24)
            .await
            .unwrap();

        let due = fx.withdrawals.list_due(Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, immediate.id);

        let due = fx
            .withdrawals
            .list_due(Utc::now() + Duration::hours(25))
            .await
            .unwrap();
        assert_eq!(due.len(), 2);
        assert!(due.iter().any(|w| w.id == later.id));
    }
}
