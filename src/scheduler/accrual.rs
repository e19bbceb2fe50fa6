//! Daily-return accrual scheduler.
//!
//! Each tick sweeps every active investment and applies at most one day of
//! returns, keyed by (investment, calendar date). The store-level marker makes
//! re-runs of the same day a no-op, so the tick interval can be much shorter
//! than a day and restarts never double-credit.

use crate::money::from_amount;
use crate::notifier::{LedgerEvent, Notifier};
use crate::store::{AccrualOutcome, InvestmentStore};
use chrono::{NaiveDate, Utc};
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct AccrualSummary {
    /// Investments credited this tick.
    pub credited: usize,
    /// Investments that reached their full payout and were completed.
    pub completed: usize,
    /// Investments already accrued for this date (or no longer active).
    pub skipped: usize,
    /// Investments whose accrual failed; they stay active for the next tick.
    pub failed: usize,
}

#[derive(Clone)]
pub struct AccrualScheduler {
    investments: InvestmentStore,
    notifier: Notifier,
    tick_interval: Duration,
}

impl AccrualScheduler {
    pub fn new(investments: InvestmentStore, notifier: Notifier, tick_interval: Duration) -> Self {
        Self {
            investments,
            notifier,
            tick_interval,
        }
    }

    /// Run one sweep for the given calendar date. A failure on one investment
    /// is logged and does not stop the rest of the batch.
    pub async fn run_tick(&self, date: NaiveDate) -> AccrualSummary {
        let ids = match self.investments.active_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!("💥 Accrual sweep could not list active investments: {}", e);
                return AccrualSummary::default();
            }
        };

        let mut summary = AccrualSummary::default();
        for id in ids {
            let owner_id = match self.investments.get(&id).await {
                Ok(Some(investment)) => investment.owner_id,
                Ok(None) => {
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("⚠️  Accrual skipped investment {}: {}", id, e);
                    summary.failed += 1;
                    continue;
                }
            };

            match self.investments.accrue_once(&id, date).await {
                Ok(AccrualOutcome::Applied { amount, completed }) => {
                    summary.credited += 1;
                    if completed {
                        summary.completed += 1;
                        info!("🏁 Investment {} fully repaid and completed", id);
                    }
                    self.notifier.publish(LedgerEvent::new(
                        "reward_earned",
                        &owner_id,
                        &id,
                        amount,
                        format!("Daily return of {} credited", from_amount(amount)),
                    ));
                }
                Ok(AccrualOutcome::AlreadyAccrued) | Ok(AccrualOutcome::Inactive) => {
                    summary.skipped += 1;
                }
                Err(e) => {
                    // Under-crediting for one cycle is the safe failure mode;
                    // the next tick retries while the investment stays active.
                    warn!("⚠️  Accrual failed for investment {}: {}", id, e);
                    summary.failed += 1;
                }
            }
        }

        if summary.credited > 0 || summary.failed > 0 {
            info!(
                "📈 Accrual sweep for {}: {} credited, {} completed, {} skipped, {} failed",
                date, summary.credited, summary.completed, summary.skipped, summary.failed
            );
        }
        summary
    }

    /// Spawn the interval loop. The accrual date is derived from the wall
    /// clock at each tick, so waking up more often than daily is harmless.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "📈 Accrual scheduler started (every {}s)",
                self.tick_interval.as_secs()
            );
            let mut ticker = interval(self.tick_interval);
            loop {
                ticker.tick().await;
                self.run_tick(Utc::now().date_naive()).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;
    use crate::money::to_amount;
    use crate::store::{open_in_memory, AccountStore, PlanStore, SharedConnection};

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_tick_credits_each_active_investment_once() {
        let conn: SharedConnection = open_in_memory().unwrap();
        let accounts = AccountStore::new(conn.clone()).await.unwrap();
        let plans = PlanStore::new(conn.clone()).await.unwrap();
        plans.seed_defaults().await.unwrap();
        let investments = InvestmentStore::new(conn).await.unwrap();
        let scheduler = AccrualScheduler::new(
            investments.clone(),
            Notifier::new(None),
            Duration::from_secs(3600),
        );

        let gold = plans.find_active("gold").await.unwrap().unwrap();
        let mut owners = Vec::new();
        for name in ["alice", "bob"] {
            let account = accounts
                .create_account(name, &format!("{}@example.com", name), "secret1", Role::User)
                .await
                .unwrap();
            accounts
                .apply_delta(&account.id, to_amount(100.0))
                .await
                .unwrap();
            investments
                .insert_with_debit(&account.id, &gold, to_amount(100.0))
                .await
                .unwrap();
            owners.push(account.id);
        }

        let summary = scheduler.run_tick(day("2026-08-20")).await;
        assert_eq!(summary.credited, 2);
        assert_eq!(summary.failed, 0);

        // Re-running the same day is a pure no-op.
        let summary = scheduler.run_tick(day("2026-08-20")).await;
        assert_eq!(summary.credited, 0);
        assert_eq!(summary.skipped, 2);

        for owner in &owners {
            let account = accounts.get_by_id(owner).await.unwrap().unwrap();
            // 8%/day on 100 = 8, exactly once.
            assert_eq!(account.wallet_balance, to_amount(8.0));
        }

        // The next day credits again.
        let summary = scheduler.run_tick(day("2026-08-21")).await;
        assert_eq!(summary.credited, 2);
    }

    #[tokio::test]
    async fn test_investment_completes_after_full_payout() {
        let conn: SharedConnection = open_in_memory().unwrap();
        let accounts = AccountStore::new(conn.clone()).await.unwrap();
        let plans = PlanStore::new(conn.clone()).await.unwrap();
        let investments = InvestmentStore::new(conn).await.unwrap();
        let scheduler = AccrualScheduler::new(
            investments.clone(),
            Notifier::new(None),
            Duration::from_secs(3600),
        );

        // 10%/day: exactly 10 ticks to repay 100.
        let plan = plans
            .upsert("tenpct", to_amount(1.0), None, 1000, true)
            .await
            .unwrap();
        let account = accounts
            .create_account("carol", "carol@example.com", "secret1", Role::User)
            .await
            .unwrap();
        accounts
            .apply_delta(&account.id, to_amount(100.0))
            .await
            .unwrap();
        let (investment, _) = investments
            .insert_with_debit(&account.id, &plan, to_amount(100.0))
            .await
            .unwrap();

        let start = day("2026-08-01");
        for offset in 0..10 {
            scheduler
                .run_tick(start + chrono::Duration::days(offset))
                .await;
        }

        let investment = investments.get(&investment.id).await.unwrap().unwrap();
        assert_eq!(investment.status, "completed");
        assert_eq!(investment.total_returned, to_amount(100.0));

        // Day 11 touches nothing.
        let summary = scheduler.run_tick(start + chrono::Duration::days(10)).await;
        assert_eq!(summary.credited, 0);

        let account = accounts.get_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(100.0));
    }
}
