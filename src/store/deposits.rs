//! Deposit storage.
//!
//! Deposits enter as `pending` and credit the wallet exactly once, inside the
//! transaction that flips them to `approved`. Rejection records the note and
//! never touches the wallet.

use crate::error::{LedgerError, LedgerResult};
use crate::money::Amount;
use crate::store::accounts::AccountStore;
use crate::store::SharedConnection;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    pub id: String,
    pub owner_id: String,
    pub amount: Amount,
    pub proof_reference: String,
    pub status: String,
    pub admin_note: String,
    pub submitted_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
}

#[derive(Clone)]
pub struct DepositStore {
    conn: SharedConnection,
}

impl DepositStore {
    pub async fn new(conn: SharedConnection) -> LedgerResult<Self> {
        {
            let c = conn.lock().await;
            c.execute(
                "CREATE TABLE IF NOT EXISTS deposits (
                    id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    amount INTEGER NOT NULL,
                    proof_reference TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'pending',
                    admin_note TEXT NOT NULL DEFAULT '',
                    submitted_at TEXT NOT NULL,
                    decided_at TEXT,
                    decided_by TEXT,
                    FOREIGN KEY (owner_id) REFERENCES accounts(id)
                )",
                [],
            )?;
            c.execute(
                "CREATE INDEX IF NOT EXISTS idx_deposits_owner ON deposits(owner_id)",
                [],
            )?;
            c.execute(
                "CREATE INDEX IF NOT EXISTS idx_deposits_status ON deposits(status)",
                [],
            )?;
        }
        Ok(Self { conn })
    }

    pub async fn submit(
        &self,
        owner_id: &str,
        amount: Amount,
        proof_reference: &str,
    ) -> LedgerResult<Deposit> {
        let deposit = Deposit {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            amount,
            proof_reference: proof_reference.to_string(),
            status: "pending".to_string(),
            admin_note: String::new(),
            submitted_at: Utc::now(),
            decided_at: None,
            decided_by: None,
        };

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO deposits (id, owner_id, amount, proof_reference,
                                   status, admin_note, submitted_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', '', ?5)",
            params![
                deposit.id,
                deposit.owner_id,
                deposit.amount,
                deposit.proof_reference,
                deposit.submitted_at.to_rfc3339(),
            ],
        )?;
        Ok(deposit)
    }

    /// Decide a pending deposit. Approval credits the wallet in the same
    /// transaction that leaves the pending state, so the credit cannot be
    /// applied twice.
    pub async fn decide(
        &self,
        id: &str,
        approve: bool,
        note: &str,
        decided_by: &str,
    ) -> LedgerResult<Deposit> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let current = match tx.query_row(
            &format!("SELECT {} FROM deposits WHERE id = ?1", DEPOSIT_COLS),
            params![id],
            map_deposit,
        ) {
            Ok(d) => d,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(LedgerError::NotFound("deposit"))
            }
            Err(e) => return Err(e.into()),
        };

        let status = if approve { "approved" } else { "rejected" };
        let decided_at = Utc::now();
        let rows = tx.execute(
            "UPDATE deposits
             SET status = ?1, admin_note = ?2, decided_at = ?3, decided_by = ?4
             WHERE id = ?5 AND status = 'pending'",
            params![status, note, decided_at.to_rfc3339(), decided_by, id],
        )?;
        if rows == 0 {
            return Err(LedgerError::IllegalTransition(format!(
                "deposit is already {}",
                current.status
            )));
        }

        if approve {
            AccountStore::apply_delta_on(&tx, &current.owner_id, current.amount)?;
        }

        tx.commit()?;
        Ok(Deposit {
            status: status.to_string(),
            admin_note: note.to_string(),
            decided_at: Some(decided_at),
            decided_by: Some(decided_by.to_string()),
            ..current
        })
    }

    pub async fn get(&self, id: &str) -> LedgerResult<Option<Deposit>> {
        let conn = self.conn.lock().await;
        let result = conn.query_row(
            &format!("SELECT {} FROM deposits WHERE id = ?1", DEPOSIT_COLS),
            params![id],
            map_deposit,
        );
        match result {
            Ok(d) => Ok(Some(d)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> LedgerResult<Vec<Deposit>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM deposits WHERE owner_id = ?1 ORDER BY submitted_at DESC",
            DEPOSIT_COLS
        ))?;
        let rows = stmt.query_map(params![owner_id], map_deposit)?;
        let mut deposits = Vec::new();
        for row in rows {
            deposits.push(row?);
        }
        Ok(deposits)
    }

    pub async fn list_all(&self, status: Option<&str>, limit: usize) -> LedgerResult<Vec<Deposit>> {
        let limit = limit.clamp(1, 1000);
        let conn = self.conn.lock().await;
        let mut deposits = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {} FROM deposits WHERE status = ?1
                     ORDER BY submitted_at DESC LIMIT ?2",
                    DEPOSIT_COLS
                ))?;
                let rows = stmt.query_map(params![status, limit as i64], map_deposit)?;
                for row in rows {
                    deposits.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {} FROM deposits ORDER BY submitted_at DESC LIMIT ?1",
                    DEPOSIT_COLS
                ))?;
                let rows = stmt.query_map(params![limit as i64], map_deposit)?;
                for row in rows {
                    deposits.push(row?);
                }
            }
        }
        Ok(deposits)
    }
}

const DEPOSIT_COLS: &str =
    "id, owner_id, amount, proof_reference, status, admin_note, submitted_at, decided_at, decided_by";

fn map_deposit(row: &Row) -> rusqlite::Result<Deposit> {
    Ok(Deposit {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        amount: row.get(2)?,
        proof_reference: row.get(3)?,
        status: row.get(4)?,
        admin_note: row.get(5)?,
        submitted_at: crate::store::column_timestamp(6, &row.get::<_, String>(6)?)?,
        decided_at: row
            .get::<_, Option<String>>(7)?
            .map(|s| crate::store::column_timestamp(7, &s))
            .transpose()?,
        decided_by: row.get(8)?,
    })
}
