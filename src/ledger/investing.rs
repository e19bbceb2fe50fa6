//! Investment creation and referral commission fan-out.

use crate::error::{LedgerError, LedgerResult};
use crate::money::{bps_of, from_amount, to_amount};
use crate::notifier::{LedgerEvent, Notifier};
use crate::store::{AccountStore, Investment, InvestmentStore, PlanStore};
use tracing::{info, warn};

/// Commission rates per referral level, in basis points: 10%, 5%, 3%.
pub const COMMISSION_BPS: [i64; 3] = [1_000, 500, 300];

#[derive(Clone)]
pub struct InvestmentLedger {
    accounts: AccountStore,
    plans: PlanStore,
    investments: InvestmentStore,
    notifier: Notifier,
}

impl InvestmentLedger {
    pub fn new(
        accounts: AccountStore,
        plans: PlanStore,
        investments: InvestmentStore,
        notifier: Notifier,
    ) -> Self {
        Self {
            accounts,
            plans,
            investments,
            notifier,
        }
    }

    /// Create an investment: resolve the plan, debit the principal, then fan
    /// commissions out to up to three referrer levels. Commission problems
    /// are logged and never undo the investment itself.
    pub async fn create_investment(
        &self,
        owner_id: &str,
        plan: &str,
        amount: f64,
    ) -> LedgerResult<Investment> {
        let plan_key = plan.trim();
        if plan_key.is_empty() {
            return Err(LedgerError::Validation("plan required".to_string()));
        }
        if !(amount.is_finite() && amount > 0.0) {
            return Err(LedgerError::Validation("invalid amount".to_string()));
        }
        let amount = to_amount(amount);

        let plan = self
            .plans
            .find_active(plan_key)
            .await?
            .ok_or(LedgerError::NotFound("plan"))?;
        if !plan.accepts(amount) {
            return Err(LedgerError::Validation(format!(
                "amount outside the {} plan range ({} - {})",
                plan.name,
                from_amount(plan.min_amount),
                plan.max_amount
                    .map(|m| from_amount(m).to_string())
                    .unwrap_or_else(|| "unlimited".to_string()),
            )));
        }

        let (investment, first_investment) = self
            .investments
            .insert_with_debit(owner_id, &plan, amount)
            .await?;

        info!(
            "💰 Investment {} created: {} into {} (daily return {})",
            investment.id,
            from_amount(investment.invested_amount),
            investment.plan_name,
            from_amount(investment.daily_return),
        );

        if let Err(e) = self
            .distribute_commissions(&investment, first_investment)
            .await
        {
            warn!(
                "⚠️  Commission distribution failed for investment {}: {}",
                investment.id, e
            );
        }

        Ok(investment)
    }

    /// Walk up the referrer chain and credit each level's commission to the
    /// pending ledger. The investor's direct referrer also gains an active
    /// referral the first time this investor invests.
    async fn distribute_commissions(
        &self,
        investment: &Investment,
        first_investment: bool,
    ) -> LedgerResult<usize> {
        let investor = self
            .accounts
            .get_by_id(&investment.owner_id)
            .await?
            .ok_or(LedgerError::NotFound("account"))?;

        let mut cursor = investor.referrer_id.clone();
        let mut credited = 0usize;

        for (level, bps) in COMMISSION_BPS.iter().enumerate() {
            let Some(referrer_id) = cursor else { break };
            let Some(referrer) = self.accounts.get_by_id(&referrer_id).await? else {
                warn!("⚠️  Dangling referrer {} in commission chain", referrer_id);
                break;
            };

            let commission = bps_of(investment.invested_amount, *bps);
            self.accounts.add_commission(&referrer.id, commission).await?;

            if level == 0 && first_investment {
                self.accounts.increment_active_referrals(&referrer.id).await?;
            }

            self.notifier.publish(LedgerEvent::new(
                "commission_earned",
                &referrer.id,
                &investment.id,
                commission,
                format!(
                    "Level {} referral commission from {}",
                    level + 1,
                    investor.username
                ),
            ));

            credited += 1;
            cursor = referrer.referrer_id;
        }

        if credited > 0 {
            info!(
                "🎯 Distributed {} commission level(s) for investment {}",
                credited, investment.id
            );
        }
        Ok(credited)
    }

    pub async fn my_investments(&self, owner_id: &str) -> LedgerResult<Vec<Investment>> {
        self.investments.list_by_owner(owner_id).await
    }

    pub async fn all_investments(&self, limit: usize) -> LedgerResult<Vec<Investment>> {
        self.investments.list_all(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;
    use crate::money::to_amount;
    use crate::store::{open_in_memory, SharedConnection};

    struct Fixture {
        accounts: AccountStore,
        ledger: InvestmentLedger,
    }

    async fn fixture() -> Fixture {
        let conn: SharedConnection = open_in_memory().unwrap();
        let accounts = AccountStore::new(conn.clone()).await.unwrap();
        let plans = PlanStore::new(conn.clone()).await.unwrap();
        plans.seed_defaults().await.unwrap();
        let investments = InvestmentStore::new(conn).await.unwrap();
        let ledger = InvestmentLedger::new(
            accounts.clone(),
            plans,
            investments,
            Notifier::new(None),
        );
        Fixture { accounts, ledger }
    }

    async fn funded(fx: &Fixture, username: &str, balance: f64) -> String {
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
        if balance > 0.0 {
            fx.accounts
                .apply_delta(&account.id, to_amount(balance))
                .await
                .unwrap();
        }
        account.id
    }

    /// grandparent <- parent <- investor referral chain.
    async fn chain(fx: &Fixture) -> (String, String, String) {
        let grandparent = funded(fx, "grandparent", 0.0).await;
        let parent = funded(fx, "parent", 0.0).await;
        let investor = funded(fx, "investor", 500.0).await;
        fx.accounts
            .attach_referrer(&parent, &grandparent)
            .await
            .unwrap();
        fx.accounts
            .attach_referrer(&investor, &parent)
            .await
            .unwrap();
        (grandparent, parent, investor)
    }

    #[tokio::test]
    async fn test_commissions_fan_out_three_levels() {
        let fx = fixture().await;
        let (grandparent, parent, investor) = chain(&fx).await;

        fx.ledger
            .create_investment(&investor, "gold", 100.0)
            .await
            .unwrap();

        let parent = fx.accounts.get_by_id(&parent).await.unwrap().unwrap();
        assert_eq!(parent.pending_commissions, to_amount(10.0));
        assert_eq!(parent.total_commissions, to_amount(10.0));
        assert_eq!(parent.active_referrals, 1);
        // Commissions never touch the wallet.
        assert_eq!(parent.wallet_balance, 0);

        let grandparent = fx.accounts.get_by_id(&grandparent).await.unwrap().unwrap();
        assert_eq!(grandparent.pending_commissions, to_amount(5.0));
        // Level 1 of the grandparent is the parent, who has not invested.
        assert_eq!(grandparent.active_referrals, 0);
    }

    #[tokio::test]
    async fn test_active_referrals_counted_on_first_investment_only() {
        let fx = fixture().await;
        let (_, parent, investor) = chain(&fx).await;

        fx.ledger
            .create_investment(&investor, "gold", 100.0)
            .await
            .unwrap();
        fx.ledger
            .create_investment(&investor, "gold", 100.0)
            .await
            .unwrap();

        let parent = fx.accounts.get_by_id(&parent).await.unwrap().unwrap();
        assert_eq!(parent.active_referrals, 1);
        assert_eq!(parent.pending_commissions, to_amount(20.0));
    }

    #[tokio::test]
    async fn test_investment_without_referrer_pays_nobody() {
        let fx = fixture().await;
        let loner = funded(&fx, "loner", 200.0).await;

        let investment = fx
            .ledger
            .create_investment(&loner, "gold", 150.0)
            .await
            .unwrap();
        assert_eq!(investment.daily_return, to_amount(12.0));

        let account = fx.accounts.get_by_id(&loner).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(50.0));
        assert_eq!(account.pending_commissions, 0);
    }

    #[tokio::test]
    async fn test_plan_range_enforced() {
        let fx = fixture().await;
        let owner = funded(&fx, "alice", 500.0).await;

        let err = fx
            .ledger
            .create_investment(&owner, "gold", 50.0)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = fx
            .ledger
            .create_investment(&owner, "no-such-plan", 100.0)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound("plan")));

        // Nothing was debited by the rejected attempts.
        let account = fx.accounts.get_by_id(&owner).await.unwrap().unwrap();
        assert_eq!(account.wallet_balance, to_amount(500.0));
    }

    #[tokio::test]
    async fn test_insufficient_principal_rejected() {
        let fx = fixture().await;
        let owner = funded(&fx, "bob", 60.0).await;

        let err = fx
            .ledger
            .create_investment(&owner, "gold", 100.0)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds));
    }
}
