//! Account storage.
//!
//! Holds credentials, wallet balances, and the referral graph. Every wallet
//! mutation in the system funnels through [`AccountStore::apply_delta`] (or
//! its in-transaction variant) so the non-negative balance guard is enforced
//! in exactly one place.

use crate::auth::models::Role;
use crate::error::{LedgerError, LedgerResult};
use crate::money::Amount;
use crate::store::SharedConnection;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

const ACCOUNT_COLS: &str = "id, username, email, password_hash, role, wallet_balance, \
     referrer_id, referral_code, total_referrals, active_referrals, \
     total_commissions, pending_commissions, disabled, created_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub wallet_balance: Amount,
    pub referrer_id: Option<String>,
    pub referral_code: String,
    pub total_referrals: i64,
    pub active_referrals: i64,
    pub total_commissions: Amount,
    pub pending_commissions: Amount,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AccountStore {
    conn: SharedConnection,
}

impl AccountStore {
    /// Create the store and initialize its tables.
    pub async fn new(conn: SharedConnection) -> LedgerResult<Self> {
        {
            let c = conn.lock().await;
            c.execute(
                "CREATE TABLE IF NOT EXISTS accounts (
                    id TEXT PRIMARY KEY,
                    username TEXT UNIQUE NOT NULL,
                    email TEXT UNIQUE NOT NULL,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL,
                    wallet_balance INTEGER NOT NULL DEFAULT 0 CHECK (wallet_balance >= 0),
                    referrer_id TEXT,
                    referral_code TEXT UNIQUE NOT NULL,
                    total_referrals INTEGER NOT NULL DEFAULT 0,
                    active_referrals INTEGER NOT NULL DEFAULT 0,
                    total_commissions INTEGER NOT NULL DEFAULT 0,
                    pending_commissions INTEGER NOT NULL DEFAULT 0,
                    disabled INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                )",
                [],
            )?;
            c.execute(
                "CREATE INDEX IF NOT EXISTS idx_accounts_referrer ON accounts(referrer_id)",
                [],
            )?;
        }
        Ok(Self { conn })
    }

    /// Seed an admin account on first boot so the instance is reachable.
    pub async fn bootstrap_default_admin(&self) -> LedgerResult<()> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE role = 'admin'",
            [],
            |row| row.get(0),
        )?;

        if count == 0 {
            let password_hash = hash("admin123", DEFAULT_COST)
                .map_err(|e| LedgerError::Persistence(e.to_string()))?;
            let id = Uuid::new_v4().to_string();
            let code = generate_referral_code(&id);

            conn.execute(
                "INSERT INTO accounts (id, username, email, password_hash, role, referral_code, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'admin', ?5, ?6)",
                params![
                    id,
                    "admin",
                    "admin@yieldvault.local",
                    password_hash,
                    code,
                    Utc::now().to_rfc3339(),
                ],
            )?;

            info!("🔐 Default admin account created (username: admin, password: admin123)");
            warn!("⚠️  CHANGE DEFAULT PASSWORD IN PRODUCTION!");
        }

        Ok(())
    }

    /// Register a new account. Username, email, and referral code are unique.
    pub async fn create_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> LedgerResult<Account> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(LedgerError::Validation("username required".to_string()));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(LedgerError::Validation("valid email required".to_string()));
        }
        if password.len() < 6 {
            return Err(LedgerError::Validation(
                "password must be at least 6 characters".to_string(),
            ));
        }

        let password_hash =
            hash(password, DEFAULT_COST).map_err(|e| LedgerError::Persistence(e.to_string()))?;
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();

        let conn = self.conn.lock().await;

        // Referral codes carry 3 random chars; regenerate on the rare collision.
        let mut attempts = 0;
        let referral_code = loop {
            let code = generate_referral_code(&id);
            let result = conn.execute(
                "INSERT INTO accounts (id, username, email, password_hash, role, referral_code, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    username,
                    email,
                    password_hash,
                    role.as_str(),
                    code,
                    created_at.to_rfc3339(),
                ],
            );
            match result {
                Ok(_) => break code,
                Err(e) if is_unique_violation(&e, "referral_code") && attempts < 3 => {
                    attempts += 1;
                }
                Err(e) if is_unique_violation(&e, "username") => {
                    return Err(LedgerError::Duplicate(
                        "username already registered".to_string(),
                    ));
                }
                Err(e) if is_unique_violation(&e, "email") => {
                    return Err(LedgerError::Duplicate(
                        "email already registered".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        };

        Ok(Account {
            id,
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role,
            wallet_balance: 0,
            referrer_id: None,
            referral_code,
            total_referrals: 0,
            active_referrals: 0,
            total_commissions: 0,
            pending_commissions: 0,
            disabled: false,
            created_at,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> LedgerResult<Option<Account>> {
        let conn = self.conn.lock().await;
        Self::get_by_id_on(&conn, id)
    }

    pub(crate) fn get_by_id_on(conn: &Connection, id: &str) -> LedgerResult<Option<Account>> {
        let result = conn.query_row(
            &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLS),
            params![id],
            map_account,
        );
        match result {
            Ok(account) => Ok(Some(account)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_by_username(&self, username: &str) -> LedgerResult<Option<Account>> {
        let conn = self.conn.lock().await;
        let result = conn.query_row(
            &format!("SELECT {} FROM accounts WHERE username = ?1", ACCOUNT_COLS),
            params![username],
            map_account,
        );
        match result {
            Ok(account) => Ok(Some(account)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_by_referral_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        let conn = self.conn.lock().await;
        let result = conn.query_row(
            &format!(
                "SELECT {} FROM accounts WHERE referral_code = ?1",
                ACCOUNT_COLS
            ),
            params![code],
            map_account,
        );
        match result {
            Ok(account) => Ok(Some(account)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Check credentials; returns the account on success, `None` on mismatch.
    pub async fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> LedgerResult<Option<Account>> {
        match self.get_by_username(username).await? {
            Some(account) => {
                let ok = verify(password, &account.password_hash)
                    .map_err(|e| LedgerError::Persistence(e.to_string()))?;
                Ok(if ok { Some(account) } else { None })
            }
            None => Ok(None),
        }
    }

    /// Apply a signed delta to a wallet balance. Fails without mutating if the
    /// account is missing or the result would go negative. Returns the new
    /// balance.
    pub async fn apply_delta(&self, account_id: &str, delta: Amount) -> LedgerResult<Amount> {
        let conn = self.conn.lock().await;
        Self::apply_delta_on(&conn, account_id, delta)
    }

    /// Transaction-scoped variant used by compound operations (investment
    /// debit, withdrawal reserve/refund, deposit credit, accrual credit).
    pub(crate) fn apply_delta_on(
        conn: &Connection,
        account_id: &str,
        delta: Amount,
    ) -> LedgerResult<Amount> {
        let rows = conn.execute(
            "UPDATE accounts SET wallet_balance = wallet_balance + ?1
             WHERE id = ?2 AND wallet_balance + ?1 >= 0",
            params![delta, account_id],
        )?;

        if rows == 0 {
            let exists = match conn.query_row(
                "SELECT 1 FROM accounts WHERE id = ?1",
                params![account_id],
                |row| row.get::<_, i64>(0),
            ) {
                Ok(_) => true,
                Err(rusqlite::Error::QueryReturnedNoRows) => false,
                Err(e) => return Err(e.into()),
            };
            return if exists {
                Err(LedgerError::InsufficientFunds)
            } else {
                Err(LedgerError::NotFound("account"))
            };
        }

        let balance: Amount = conn.query_row(
            "SELECT wallet_balance FROM accounts WHERE id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;
        Ok(balance)
    }

    /// Point an account at its referrer. Rejected once a referrer is set.
    /// Bumps the referrer's total referral count in the same transaction.
    pub async fn attach_referrer(&self, account_id: &str, referrer_id: &str) -> LedgerResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE accounts SET referrer_id = ?1 WHERE id = ?2 AND referrer_id IS NULL",
            params![referrer_id, account_id],
        )?;
        if rows == 0 {
            return match Self::get_by_id_on(&tx, account_id)? {
                Some(_) => Err(LedgerError::Validation(
                    "account already has a referrer".to_string(),
                )),
                None => Err(LedgerError::NotFound("account")),
            };
        }

        tx.execute(
            "UPDATE accounts SET total_referrals = total_referrals + 1 WHERE id = ?1",
            params![referrer_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Credit a referral commission. Commissions accumulate on the pending
    /// ledger only; the wallet balance is never touched here.
    pub async fn add_commission(&self, referrer_id: &str, amount: Amount) -> LedgerResult<()> {
        let conn = self.conn.lock().await;
        let rows = conn.execute(
            "UPDATE accounts
             SET total_commissions = total_commissions + ?1,
                 pending_commissions = pending_commissions + ?1
             WHERE id = ?2",
            params![amount, referrer_id],
        )?;
        if rows == 0 {
            return Err(LedgerError::NotFound("account"));
        }
        Ok(())
    }

    pub async fn increment_active_referrals(&self, referrer_id: &str) -> LedgerResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE accounts SET active_referrals = active_referrals + 1 WHERE id = ?1",
            params![referrer_id],
        )?;
        Ok(())
    }

    /// Soft-disable or re-enable an account. A disabled account keeps its
    /// balance, history, and downline but can no longer log in.
    pub async fn set_disabled(&self, account_id: &str, disabled: bool) -> LedgerResult<()> {
        let conn = self.conn.lock().await;
        let rows = conn.execute(
            "UPDATE accounts SET disabled = ?1 WHERE id = ?2",
            params![disabled as i64, account_id],
        )?;
        if rows == 0 {
            return Err(LedgerError::NotFound("account"));
        }
        Ok(())
    }

    /// Accounts directly referred by the given account, newest first.
    pub async fn direct_referrals(&self, account_id: &str) -> LedgerResult<Vec<Account>> {
        let conn = self.conn.lock().await;
        Self::direct_referrals_on(&conn, account_id)
    }

    pub(crate) fn direct_referrals_on(
        conn: &Connection,
        account_id: &str,
    ) -> LedgerResult<Vec<Account>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM accounts WHERE referrer_id = ?1 ORDER BY created_at DESC",
            ACCOUNT_COLS
        ))?;
        let rows = stmt.query_map(params![account_id], map_account)?;
        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?);
        }
        Ok(accounts)
    }
}

fn map_account(row: &Row) -> rusqlite::Result<Account> {
    let role_str: String = row.get(4)?;
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: Role::from_str(&role_str).unwrap_or(Role::User),
        wallet_balance: row.get(5)?,
        referrer_id: row.get(6)?,
        referral_code: row.get(7)?,
        total_referrals: row.get(8)?,
        active_referrals: row.get(9)?,
        total_commissions: row.get(10)?,
        pending_commissions: row.get(11)?,
        disabled: row.get::<_, i64>(12)? == 1,
        created_at: crate::store::column_timestamp(13, &row.get::<_, String>(13)?)?,
    })
}

/// REF + last 6 alphanumerics of the account id + 3 random chars.
fn generate_referral_code(id: &str) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let tail: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase();
    let tail = &tail[tail.len().saturating_sub(6)..];

    let mut rng = rand::thread_rng();
    let suffix: String = (0..3)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();

    format!("REF{}{}", tail, suffix)
}

fn is_unique_violation(e: &rusqlite::Error, column: &str) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains(&format!("accounts.{}", column))
    )
}
