//! Promotional ad catalog and watch-reward ledger.
//!
//! Each account earns an ad's reward at most once: the watch row carries a
//! UNIQUE (account_id, ad_id) constraint and is inserted in the same
//! transaction that credits the wallet, so a repeat watch is rejected before
//! money moves.

use crate::error::{LedgerError, LedgerResult};
use crate::money::Amount;
use crate::store::accounts::AccountStore;
use crate::store::SharedConnection;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ad {
    pub id: String,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub reward: Amount,
    pub duration_secs: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One account having watched one ad, with the reward it locked in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdWatch {
    pub id: String,
    pub account_id: String,
    pub ad_id: String,
    pub ad_title: String,
    pub reward: Amount,
    pub watched_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AdStore {
    conn: SharedConnection,
}

impl AdStore {
    pub async fn new(conn: SharedConnection) -> LedgerResult<Self> {
        {
            let c = conn.lock().await;
            c.execute(
                "CREATE TABLE IF NOT EXISTS ads (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL,
                    video_url TEXT NOT NULL,
                    reward INTEGER NOT NULL,
                    duration_secs INTEGER NOT NULL,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL
                )",
                [],
            )?;
            c.execute(
                "CREATE TABLE IF NOT EXISTS ad_watches (
                    id TEXT PRIMARY KEY,
                    account_id TEXT NOT NULL,
                    ad_id TEXT NOT NULL,
                    reward INTEGER NOT NULL,
                    watched_at TEXT NOT NULL,
                    UNIQUE (account_id, ad_id),
                    FOREIGN KEY (account_id) REFERENCES accounts(id),
                    FOREIGN KEY (ad_id) REFERENCES ads(id)
                )",
                [],
            )?;
            c.execute(
                "CREATE INDEX IF NOT EXISTS idx_ad_watches_account ON ad_watches(account_id)",
                [],
            )?;
        }
        Ok(Self { conn })
    }

    /// Insert a starter catalog if no ads exist.
    pub async fn seed_defaults(&self) -> LedgerResult<()> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM ads", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(());
        }

        let defaults: [(&str, &str, &str, Amount, i64); 3] = [
            (
                "Palmolive Pakistan Ad",
                "Watch this Palmolive Pakistan advertisement to earn a reward",
                "https://sample-videos.com/zip/10/mp4/SampleVideo_1280x720_1mb.mp4",
                1_200_000,
                30,
            ),
            (
                "Beautiful Wear Collection",
                "Check out this fashion collection to earn a reward",
                "https://sample-videos.com/zip/10/mp4/SampleVideo_1280x720_2mb.mp4",
                1_200_000,
                30,
            ),
            (
                "Golden Pearl Official",
                "Watch this Golden Pearl advertisement to earn a reward",
                "https://sample-videos.com/zip/10/mp4/SampleVideo_1280x720_5mb.mp4",
                1_200_000,
                30,
            ),
        ];

        for (title, description, video_url, reward, duration) in defaults {
            conn.execute(
                "INSERT INTO ads (id, title, description, video_url, reward,
                                  duration_secs, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
                params![
                    Uuid::new_v4().to_string(),
                    title,
                    description,
                    video_url,
                    reward,
                    duration,
                    Utc::now().to_rfc3339(),
                ],
            )?;
        }

        info!("📺 Seeded {} default ads", defaults.len());
        Ok(())
    }

    pub async fn create(
        &self,
        title: &str,
        description: &str,
        video_url: &str,
        reward: Amount,
        duration_secs: i64,
    ) -> LedgerResult<Ad> {
        if title.trim().is_empty() || description.trim().is_empty() || video_url.trim().is_empty()
        {
            return Err(LedgerError::Validation(
                "title, description, and video_url required".to_string(),
            ));
        }
        if reward <= 0 {
            return Err(LedgerError::Validation("reward must be > 0".to_string()));
        }
        if duration_secs <= 0 {
            return Err(LedgerError::Validation(
                "duration_secs must be > 0".to_string(),
            ));
        }

        let ad = Ad {
            id: Uuid::new_v4().to_string(),
            title: title.trim().to_string(),
            description: description.trim().to_string(),
            video_url: video_url.trim().to_string(),
            reward,
            duration_secs,
            is_active: true,
            created_at: Utc::now(),
        };

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO ads (id, title, description, video_url, reward,
                              duration_secs, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            params![
                ad.id,
                ad.title,
                ad.description,
                ad.video_url,
                ad.reward,
                ad.duration_secs,
                ad.created_at.to_rfc3339(),
            ],
        )?;
        Ok(ad)
    }

    /// Replace an ad's content and flags wholesale.
    pub async fn update(
        &self,
        id: &str,
        title: &str,
        description: &str,
        video_url: &str,
        reward: Amount,
        duration_secs: i64,
        is_active: bool,
    ) -> LedgerResult<Ad> {
        if reward <= 0 {
            return Err(LedgerError::Validation("reward must be > 0".to_string()));
        }

        let conn = self.conn.lock().await;
        let rows = conn.execute(
            "UPDATE ads SET title = ?1, description = ?2, video_url = ?3,
                            reward = ?4, duration_secs = ?5, is_active = ?6
             WHERE id = ?7",
            params![
                title.trim(),
                description.trim(),
                video_url.trim(),
                reward,
                duration_secs,
                is_active as i64,
                id
            ],
        )?;
        if rows == 0 {
            return Err(LedgerError::NotFound("ad"));
        }

        let ad = conn.query_row(
            &format!("SELECT {} FROM ads WHERE id = ?1", AD_COLS),
            params![id],
            map_ad,
        )?;
        Ok(ad)
    }

    pub async fn get(&self, id: &str) -> LedgerResult<Option<Ad>> {
        let conn = self.conn.lock().await;
        let result = conn.query_row(
            &format!("SELECT {} FROM ads WHERE id = ?1", AD_COLS),
            params![id],
            map_ad,
        );
        match result {
            Ok(ad) => Ok(Some(ad)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// A random sample of active ads for the earn page.
    pub async fn sample_active(&self, limit: usize) -> LedgerResult<Vec<Ad>> {
        let limit = limit.clamp(1, 50);
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM ads WHERE is_active = 1 ORDER BY RANDOM() LIMIT ?1",
            AD_COLS
        ))?;
        let rows = stmt.query_map(params![limit as i64], map_ad)?;
        let mut ads = Vec::new();
        for row in rows {
            ads.push(row?);
        }
        Ok(ads)
    }

    pub async fn list_all(&self) -> LedgerResult<Vec<Ad>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM ads ORDER BY created_at DESC",
            AD_COLS
        ))?;
        let rows = stmt.query_map([], map_ad)?;
        let mut ads = Vec::new();
        for row in rows {
            ads.push(row?);
        }
        Ok(ads)
    }

    /// Record a watch and credit the reward atomically. Returns the watch row
    /// and the new wallet balance.
    pub async fn record_watch(
        &self,
        account_id: &str,
        ad_id: &str,
    ) -> LedgerResult<(AdWatch, Amount)> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let ad = match tx.query_row(
            &format!("SELECT {} FROM ads WHERE id = ?1", AD_COLS),
            params![ad_id],
            map_ad,
        ) {
            Ok(ad) => ad,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(LedgerError::NotFound("ad"))
            }
            Err(e) => return Err(e.into()),
        };
        if !ad.is_active {
            return Err(LedgerError::NotFound("ad"));
        }

        let watch = AdWatch {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            ad_id: ad.id.clone(),
            ad_title: ad.title.clone(),
            reward: ad.reward,
            watched_at: Utc::now(),
        };

        let inserted = tx.execute(
            "INSERT INTO ad_watches (id, account_id, ad_id, reward, watched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                watch.id,
                watch.account_id,
                watch.ad_id,
                watch.reward,
                watch.watched_at.to_rfc3339(),
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_watch_conflict(&e) => {
                return Err(LedgerError::Duplicate(
                    "ad already watched and rewarded".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        }

        let balance = AccountStore::apply_delta_on(&tx, account_id, ad.reward)?;

        tx.commit()?;
        Ok((watch, balance))
    }

    /// Watch history for an account, newest first.
    pub async fn watches_by_account(&self, account_id: &str) -> LedgerResult<Vec<AdWatch>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT w.id, w.account_id, w.ad_id, a.title, w.reward, w.watched_at
             FROM ad_watches w JOIN ads a ON a.id = w.ad_id
             WHERE w.account_id = ?1 ORDER BY w.watched_at DESC",
        )?;
        let rows = stmt.query_map(params![account_id], map_watch)?;
        let mut watches = Vec::new();
        for row in rows {
            watches.push(row?);
        }
        Ok(watches)
    }
}

const AD_COLS: &str =
    "id, title, description, video_url, reward, duration_secs, is_active, created_at";

fn map_ad(row: &Row) -> rusqlite::Result<Ad> {
    Ok(Ad {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        video_url: row.get(3)?,
        reward: row.get(4)?,
        duration_secs: row.get(5)?,
        is_active: row.get::<_, i64>(6)? == 1,
        created_at: crate::store::column_timestamp(7, &row.get::<_, String>(7)?)?,
    })
}

fn map_watch(row: &Row) -> rusqlite::Result<AdWatch> {
    Ok(AdWatch {
        id: row.get(0)?,
        account_id: row.get(1)?,
        ad_id: row.get(2)?,
        ad_title: row.get(3)?,
        reward: row.get(4)?,
        watched_at: crate::store::column_timestamp(5, &row.get::<_, String>(5)?)?,
    })
}

fn is_watch_conflict(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("ad_watches")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;
    use crate::money::to_amount;
    use crate::store::{open_in_memory, SharedConnection};

    struct Fixture {
        accounts: AccountStore,
        ads: AdStore,
    }

    async fn fixture() -> Fixture {
        let conn: SharedConnection = open_in_memory().unwrap();
        let accounts = AccountStore::new(conn.clone()).await.unwrap();
        let ads = AdStore::new(conn).await.unwrap();
        Fixture { accounts, ads }
    }

    async fn account(fx: &Fixture, username: &str) -> String {
        fx.accounts
            .create_account(
                username,
                &format!("{}@example.com", username),
                "secret1",
                Role::User,
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_seed_defaults_is_idempotent() {
        let fx = fixture().await;
        fx.ads.seed_defaults().await.unwrap();
        fx.ads.seed_defaults().await.unwrap();

        let ads = fx.ads.list_all().await.unwrap();
        assert_eq!(ads.len(), 3);
        assert!(ads.iter().all(|ad| ad.is_active));
        assert!(ads.iter().all(|ad| ad.reward == 1_200_000));
    }

    #[tokio::test]
    async fn test_watch_credits_wallet_exactly_once() {
        let fx = fixture().await;
        let viewer = account(&fx, "alice").await;
        let ad = fx
            .ads
            .create("Demo", "A demo spot", "https://cdn.example/demo.mp4", to_amount(1.2), 30)
            .await
            .unwrap();

        let (watch, balance) = fx.ads.record_watch(&viewer, &ad.id).await.unwrap();
        assert_eq!(watch.reward, to_amount(1.2));
        assert_eq!(balance, to_amount(1.2));

        let err = fx.ads.record_watch(&viewer, &ad.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Duplicate(_)));

        let account = fx.accounts.get_by_id(&viewer).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(1.2));
    }

    #[tokio::test]
    async fn test_watch_rejects_unknown_and_inactive_ads() {
        let fx = fixture().await;
        let viewer = account(&fx, "bob").await;

        let err = fx.ads.record_watch(&viewer, "no-such-ad").await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound("ad")));

        let ad = fx
            .ads
            .create("Pulled", "Off the air", "https://cdn.example/pulled.mp4", to_amount(1.0), 15)
            .await
            .unwrap();
        fx.ads
            .update(
                &ad.id,
                &ad.title,
                &ad.description,
                &ad.video_url,
                ad.reward,
                ad.duration_secs,
                false,
            )
            .await
            .unwrap();

        let err = fx.ads.record_watch(&viewer, &ad.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound("ad")));
        let account = fx.accounts.get_by_id(&viewer).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, 0);
    }

    #[tokio::test]
    async fn test_sample_active_skips_inactive() {
        let fx = fixture().await;
        fx.ads.seed_defaults().await.unwrap();
        let pulled = fx.ads.list_all().await.unwrap().remove(0);
        fx.ads
            .update(
                &pulled.id,
                &pulled.title,
                &pulled.description,
                &pulled.video_url,
                pulled.reward,
                pulled.duration_secs,
                false,
            )
            .await
            .unwrap();

        let sample = fx.ads.sample_active(6).await.unwrap();
        assert_eq!(sample.len(), 2);
        assert!(sample.iter().all(|ad| ad.id != pulled.id));
    }

    #[tokio::test]
    async fn test_history_carries_titles_newest_first() {
        let fx = fixture().await;
        let viewer = account(&fx, "carol").await;
        let first = fx
            .ads
            .create("First", "d", "https://cdn.example/1.mp4", to_amount(1.0), 15)
            .await
            .unwrap();
        let second = fx
            .ads
            .create("Second", "d", "https://cdn.example/2.mp4", to_amount(2.0), 15)
            .await
            .unwrap();

        fx.ads.record_watch(&viewer, &first.id).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        fx.ads.record_watch(&viewer, &second.id).await.unwrap();

        let history = fx.ads.watches_by_account(&viewer).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].ad_title, "Second");
        assert_eq!(history[1].ad_title, "First");
        assert_eq!(history[0].reward, to_amount(2.0));
    }
}
