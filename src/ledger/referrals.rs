//! Referral code application and team summaries.

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::investing::COMMISSION_BPS;
use crate::money::from_amount;
use crate::store::{Account, AccountStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct ReferralSummary {
    pub referral_code: String,
    pub total_referrals: i64,
    pub active_referrals: i64,
    pub total_commissions: f64,
    pub pending_commissions: f64,
    pub levels: Vec<ReferralLevel>,
    pub direct: Vec<ReferralMember>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferralLevel {
    pub level: u8,
    pub members: usize,
    pub commission_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferralMember {
    pub username: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ReferralProgram {
    accounts: AccountStore,
}

impl ReferralProgram {
    pub fn new(accounts: AccountStore) -> Self {
        Self { accounts }
    }

    /// Bind an account to the owner of `code`. An account can be referred at
    /// most once, never by itself, and never by its own downline.
    pub async fn apply_code(&self, account_id: &str, code: &str) -> LedgerResult<Account> {
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(LedgerError::Validation("referral code required".to_string()));
        }

        let referrer = self
            .accounts
            .get_by_referral_code(&code)
            .await?
            .ok_or(LedgerError::NotFound("referral code"))?;
        if referrer.id == account_id {
            return Err(LedgerError::Validation(
                "cannot use your own referral code".to_string(),
            ));
        }

        // Reject codes owned by the account's own downline; binding to one
        // would close a referral loop. The walk covers the whole ancestor
        // chain, with a visited set so a pre-existing bad row cannot spin it.
        let mut seen: HashSet<String> = HashSet::new();
        let mut cursor = referrer.referrer_id.clone();
        while let Some(id) = cursor {
            if id == account_id {
                return Err(LedgerError::Validation(
                    "referral code belongs to your own downline".to_string(),
                ));
            }
            if !seen.insert(id.clone()) {
                break;
            }
            cursor = match self.accounts.get_by_id(&id).await? {
                Some(account) => account.referrer_id,
                None => None,
            };
        }

        self.accounts.attach_referrer(account_id, &referrer.id).await?;
        info!(
            "🤝 Account {} joined the downline of {}",
            account_id, referrer.username
        );
        Ok(referrer)
    }

    /// Commission counters plus member counts for the three paying levels.
    pub async fn summary(&self, account_id: &str) -> LedgerResult<ReferralSummary> {
        let account = self
            .accounts
            .get_by_id(account_id)
            .await?
            .ok_or(LedgerError::NotFound("account"))?;

        let level1 = self.accounts.direct_referrals(account_id).await?;
        let mut level2 = Vec::new();
        for member in &level1 {
            level2.extend(self.accounts.direct_referrals(&member.id).await?);
        }
        let mut level3 = Vec::new();
        for member in &level2 {
            level3.extend(self.accounts.direct_referrals(&member.id).await?);
        }

        let levels = [&level1, &level2, &level3]
            .iter()
            .zip(COMMISSION_BPS)
            .enumerate()
            .map(|(i, (members, bps))| ReferralLevel {
                level: i as u8 + 1,
                members: members.len(),
                commission_rate: bps as f64 / 10_000.0,
            })
            .collect();

        Ok(ReferralSummary {
            referral_code: account.referral_code,
            total_referrals: account.total_referrals,
            active_referrals: account.active_referrals,
            total_commissions: from_amount(account.total_commissions),
            pending_commissions: from_amount(account.pending_commissions),
            levels,
            direct: level1
                .into_iter()
                .map(|member| ReferralMember {
                    username: member.username,
                    joined_at: member.created_at,
                })
                .collect(),
        })
    }
}
