//! Withdrawal request and decision workflow.

use crate::error::{LedgerError, LedgerResult};
use crate::money::{from_amount, to_amount};
use crate::notifier::{LedgerEvent, Notifier};
use crate::store::{Withdrawal, WithdrawalStore};
use tracing::info;

#[derive(Clone)]
pub struct WithdrawalProcessor {
    withdrawals: WithdrawalStore,
    notifier: Notifier,
    grace_hours: i64,
}

impl WithdrawalProcessor {
    pub fn new(withdrawals: WithdrawalStore, notifier: Notifier, grace_hours: i64) -> Self {
        Self {
            withdrawals,
            notifier,
            grace_hours,
        }
    }

    /// Accept a withdrawal request, reserving the funds immediately.
    pub async fn request(
        &self,
        owner_id: &str,
        amount: f64,
        address: &str,
        network: &str,
    ) -> LedgerResult<Withdrawal> {
        let address = address.trim();
        let network = network.trim();
        if address.is_empty() {
            return Err(LedgerError::Validation("address required".to_string()));
        }
        if network.is_empty() {
            return Err(LedgerError::Validation("network required".to_string()));
        }
        if !(amount.is_finite() && amount > 0.0) {
            return Err(LedgerError::Validation("invalid amount".to_string()));
        }

        let withdrawal = self
            .withdrawals
            .request_with_reserve(owner_id, to_amount(amount), address, network, self.grace_hours)
            .await?;

        info!(
            "🏧 Withdrawal {} requested: {} to {} ({}), auto-processes at {}",
            withdrawal.id,
            from_amount(withdrawal.amount),
            withdrawal.address,
            withdrawal.network,
            withdrawal.auto_process_at,
        );
        Ok(withdrawal)
    }

    /// Admin decision on a pending withdrawal.
    pub async fn decide(
        &self,
        admin_id: &str,
        withdrawal_id: &str,
        approve: bool,
        note: Option<String>,
    ) -> LedgerResult<Withdrawal> {
        let note = note.unwrap_or_default();
        let withdrawal = self
            .withdrawals
            .decide(withdrawal_id, approve, &note, admin_id)
            .await?;

        let kind = if approve {
            "withdrawal_approved"
        } else {
            "withdrawal_rejected"
        };
        self.notifier.publish(LedgerEvent::new(
            kind,
            &withdrawal.owner_id,
            &withdrawal.id,
            withdrawal.amount,
            if note.is_empty() {
                format!("Withdrawal {}", withdrawal.status)
            } else {
                note
            },
        ));

        if approve {
            info!("✅ Withdrawal {} approved by {}", withdrawal.id, admin_id);
        } else {
            info!(
                "🚫 Withdrawal {} rejected by {}, funds refunded",
                withdrawal.id, admin_id
            );
        }
        Ok(withdrawal)
    }

    pub async fn my_withdrawals(&self, owner_id: &str) -> LedgerResult<Vec<Withdrawal>> {
        self.withdrawals.list_by_owner(owner_id).await
    }

    pub async fn all_withdrawals(
        &self,
        status: Option<&str>,
        limit: usize,
    ) -> LedgerResult<Vec<Withdrawal>> {
        self.withdrawals.list_all(status, limit).await
    }
}
