//! JSON projections of ledger entities.
//!
//! Fixed-point amounts become plain dollar floats here and nowhere else;
//! internal fields (password hashes, referrer pointers) never leave.

use crate::money::from_amount;
use crate::store::{Account, Ad, AdWatch, Deposit, Investment, InvestmentPlan, Withdrawal};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub wallet_balance: f64,
    pub referral_code: String,
    pub total_referrals: i64,
    pub active_referrals: i64,
    pub total_commissions: f64,
    pub pending_commissions: f64,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            email: account.email.clone(),
            role: account.role.as_str().to_string(),
            wallet_balance: from_amount(account.wallet_balance),
            referral_code: account.referral_code.clone(),
            total_referrals: account.total_referrals,
            active_referrals: account.active_referrals,
            total_commissions: from_amount(account.total_commissions),
            pending_commissions: from_amount(account.pending_commissions),
            disabled: account.disabled,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanView {
    pub id: String,
    pub name: String,
    pub min_amount: f64,
    pub max_amount: Option<f64>,
    pub daily_return_rate: f64,
}

impl From<&InvestmentPlan> for PlanView {
    fn from(plan: &InvestmentPlan) -> Self {
        Self {
            id: plan.id.clone(),
            name: plan.name.clone(),
            min_amount: from_amount(plan.min_amount),
            max_amount: plan.max_amount.map(from_amount),
            daily_return_rate: plan.daily_return_bps as f64 / 10_000.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvestmentView {
    pub id: String,
    pub owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_username: Option<String>,
    pub plan_id: String,
    pub plan_name: String,
    pub invested_amount: f64,
    pub daily_return: f64,
    pub total_returned: f64,
    pub status: String,
    pub start_date: DateTime<Utc>,
}

impl From<&Investment> for InvestmentView {
    fn from(investment: &Investment) -> Self {
        Self {
            id: investment.id.clone(),
            owner_id: investment.owner_id.clone(),
            owner_username: None,
            plan_id: investment.plan_id.clone(),
            plan_name: investment.plan_name.clone(),
            invested_amount: from_amount(investment.invested_amount),
            daily_return: from_amount(investment.daily_return),
            total_returned: from_amount(investment.total_returned),
            status: investment.status.clone(),
            start_date: investment.start_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub reward: f64,
    pub duration_secs: i64,
    pub is_active: bool,
}

impl From<&Ad> for AdView {
    fn from(ad: &Ad) -> Self {
        Self {
            id: ad.id.clone(),
            title: ad.title.clone(),
            description: ad.description.clone(),
            video_url: ad.video_url.clone(),
            reward: from_amount(ad.reward),
            duration_secs: ad.duration_secs,
            is_active: ad.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdWatchView {
    pub id: String,
    pub ad_id: String,
    pub ad_title: String,
    pub reward: f64,
    pub watched_at: DateTime<Utc>,
}

impl From<&AdWatch> for AdWatchView {
    fn from(watch: &AdWatch) -> Self {
        Self {
            id: watch.id.clone(),
            ad_id: watch.ad_id.clone(),
            ad_title: watch.ad_title.clone(),
            reward: from_amount(watch.reward),
            watched_at: watch.watched_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WithdrawalView {
    pub id: String,
    pub owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_username: Option<String>,
    pub amount: f64,
    pub address: String,
    pub network: String,
    pub status: String,
    pub admin_note: String,
    pub requested_at: DateTime<Utc>,
    pub auto_process_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
}

impl From<&Withdrawal> for WithdrawalView {
    fn from(withdrawal: &Withdrawal) -> Self {
        Self {
            id: withdrawal.id.clone(),
            owner_id: withdrawal.owner_id.clone(),
            owner_username: None,
            amount: from_amount(withdrawal.amount),
            address: withdrawal.address.clone(),
            network: withdrawal.network.clone(),
            status: withdrawal.status.clone(),
            admin_note: withdrawal.admin_note.clone(),
            requested_at: withdrawal.requested_at,
            auto_process_at: withdrawal.auto_process_at,
            decided_at: withdrawal.decided_at,
            decided_by: withdrawal.decided_by.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DepositView {
    pub id: String,
    pub owner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_username: Option<String>,
    pub amount: f64,
    pub proof_reference: String,
    pub status: String,
    pub admin_note: String,
    pub submitted_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
}

impl From<&Deposit> for DepositView {
    fn from(deposit: &Deposit) -> Self {
        Self {
            id: deposit.id.clone(),
            owner_id: deposit.owner_id.clone(),
            owner_username: None,
            amount: from_amount(deposit.amount),
            proof_reference: deposit.proof_reference.clone(),
            status: deposit.status.clone(),
            admin_note: deposit.admin_note.clone(),
            submitted_at: deposit.submitted_at,
            decided_at: deposit.decided_at,
            decided_by: deposit.decided_by.clone(),
        }
    }
}
