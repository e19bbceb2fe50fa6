//! Auto-withdrawal scheduler.
//!
//! Pending withdrawals whose grace period has elapsed are pushed through the
//! payout gateway and approved, exactly as a manual approval would. A payout
//! failure rejects the withdrawal and refunds the reserved funds, so nothing
//! is ever left silently pending past its deadline.

use crate::error::LedgerError;
use crate::notifier::{LedgerEvent, Notifier};
use crate::scheduler::payout::PayoutGateway;
use crate::store::WithdrawalStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

const AUTO_APPROVE_NOTE: &str = "Automatically processed after 24 hours";
const AUTO_REJECT_NOTE: &str = "Auto-processing failed - refunded to user";
const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct AutoWithdrawalSummary {
    pub approved: usize,
    /// Payout failures turned into refunds.
    pub rejected: usize,
    /// Rows that could not be transitioned at all; retried next tick.
    pub failed: usize,
}

#[derive(Clone)]
pub struct AutoWithdrawalScheduler {
    withdrawals: WithdrawalStore,
    notifier: Notifier,
    gateway: Arc<dyn PayoutGateway>,
    tick_interval: Duration,
}

impl AutoWithdrawalScheduler {
    pub fn new(
        withdrawals: WithdrawalStore,
        notifier: Notifier,
        gateway: Arc<dyn PayoutGateway>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            withdrawals,
            notifier,
            gateway,
            tick_interval,
        }
    }

    /// Process every withdrawal due at `now`. Per-withdrawal failures are
    /// isolated; the decision itself is guarded by the pending-status check,
    /// so racing an admin decision resolves to whoever transitions first.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> AutoWithdrawalSummary {
        let due = match self.withdrawals.list_due(now).await {
            Ok(due) => due,
            Err(e) => {
                error!("💥 Auto-withdrawal sweep could not list due rows: {}", e);
                return AutoWithdrawalSummary::default();
            }
        };

        let mut summary = AutoWithdrawalSummary::default();
        for withdrawal in due {
            let (approve, note) = match self.gateway.send(&withdrawal).await {
                Ok(()) => (true, AUTO_APPROVE_NOTE),
                Err(e) => {
                    warn!(
                        "⚠️  Payout failed for withdrawal {}: {} - rejecting with refund",
                        withdrawal.id, e
                    );
                    (false, AUTO_REJECT_NOTE)
                }
            };

            match self
                .withdrawals
                .decide(&withdrawal.id, approve, note, SYSTEM_ACTOR)
                .await
            {
                Ok(decided) => {
                    if approve {
                        summary.approved += 1;
                    } else {
                        summary.rejected += 1;
                    }
                    let kind = if approve {
                        "withdrawal_approved"
                    } else {
                        "withdrawal_rejected"
                    };
                    self.notifier.publish(LedgerEvent::new(
                        kind,
                        &decided.owner_id,
                        &decided.id,
                        decided.amount,
                        note.to_string(),
                    ));
                }
                // An admin decided it between the scan and now.
                Err(LedgerError::IllegalTransition(_)) => {}
                Err(e) => {
                    warn!(
                        "⚠️  Auto-processing failed for withdrawal {}: {}",
                        withdrawal.id, e
                    );
                    summary.failed += 1;
                }
            }
        }

        if summary.approved > 0 || summary.rejected > 0 || summary.failed > 0 {
            info!(
                "🏧 Auto-withdrawal sweep: {} approved, {} rejected, {} failed",
                summary.approved, summary.rejected, summary.failed
            );
        }
        summary
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "🏧 Auto-withdrawal scheduler started (every {}s)",
                self.tick_interval.as_secs()
            );
            let mut ticker = interval(self.tick_interval);
            loop {
                ticker.tick().await;
                self.run_tick(Utc::now()).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;
    use crate::money::to_amount;
    use crate::scheduler::payout::ManualPayoutGateway;
    use crate::store::{open_in_memory, AccountStore, SharedConnection, Withdrawal};
    use chrono::Duration as ChronoDuration;

    struct FailingGateway;

    #[async_trait::async_trait]
    impl PayoutGateway for FailingGateway {
        async fn send(&self, _withdrawal: &Withdrawal) -> anyhow::Result<()> {
            anyhow::bail!("rail unavailable")
        }
    }

    async fn setup(
        gateway: Arc<dyn PayoutGateway>,
    ) -> (AccountStore, WithdrawalStore, AutoWithdrawalScheduler, String) {
        let conn: SharedConnection = open_in_memory().unwrap();
        let accounts = AccountStore::new(conn.clone()).await.unwrap();
        let withdrawals = WithdrawalStore::new(conn).await.unwrap();
        let scheduler = AutoWithdrawalScheduler::new(
            withdrawals.clone(),
            Notifier::new(None),
            gateway,
            Duration::from_secs(3600),
        );

        let owner = accounts
            .create_account("alice", "alice@example.com", "secret1", Role::User)
            .await
            .unwrap();
        accounts
            .apply_delta(&owner.id, to_amount(100.0))
            .await
            .unwrap();
        (accounts, withdrawals, scheduler, owner.id)
    }

    #[tokio::test]
    async fn test_due_withdrawal_auto_approved() {
        let (accounts, withdrawals, scheduler, owner) =
            setup(Arc::new(ManualPayoutGateway)).await;

        let due = withdrawals
            .request_with_reserve(&owner, to_amount(40.0), "0xabc", "erc20", 0)
            .await
            .unwrap();
        let future = withdrawals
            .request_with_reserve(&owner, to_amount(10.0), "0xdef", "erc20", 24)
            .await
            .unwrap();

        let summary = scheduler.run_tick(Utc::now()).await;
        assert_eq!(summary.approved, 1);
        assert_eq!(summary.rejected, 0);

        let due = withdrawals.get(&due.id).await.unwrap().unwrap();
        assert_eq!(due.status, "approved");
        assert_eq!(due.admin_note, AUTO_APPROVE_NOTE);
        assert_eq!(due.decided_by.as_deref(), Some(SYSTEM_ACTOR));

        // The one still inside its grace period is untouched.
        let future = withdrawals.get(&future.id).await.unwrap().unwrap();
        assert_eq!(future.status, "pending");

        // Approval keeps the reserved funds out of the wallet.
        let account = accounts.get_by_id(&owner).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(50.0));
    }

    #[tokio::test]
    async fn test_payout_failure_rejects_and_refunds() {
        let (accounts, withdrawals, scheduler, owner) = setup(Arc::new(FailingGateway)).await;

        let withdrawal = withdrawals
            .request_with_reserve(&owner, to_amount(40.0), "0xabc", "erc20", 0)
            .await
            .unwrap();

        let summary = scheduler.run_tick(Utc::now()).await;
        assert_eq!(summary.approved, 0);
        assert_eq!(summary.rejected, 1);

        let withdrawal = withdrawals.get(&withdrawal.id).await.unwrap().unwrap();
        assert_eq!(withdrawal.status, "rejected");
        assert_eq!(withdrawal.admin_note, AUTO_REJECT_NOTE);

        let account = accounts.get_by_id(&owner).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(100.0));
    }

    #[tokio::test]
    async fn test_tick_is_idempotent() {
        let (_, withdrawals, scheduler, owner) = setup(Arc::new(ManualPayoutGateway)).await;

        withdrawals
            .request_with_reserve(&owner, to_amount(40.0), "0xabc", "erc20", 0)
            .await
            .unwrap();

        let first = scheduler.run_tick(Utc::now()).await;
        assert_eq!(first.approved, 1);

        let second = scheduler
            .run_tick(Utc::now() + ChronoDuration::hours(1))
            .await;
        assert_eq!(second, AutoWithdrawalSummary::default());
    }
}
