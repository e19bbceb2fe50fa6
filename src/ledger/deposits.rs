//! Deposit submission and approval workflow.

use crate::error::{LedgerError, LedgerResult};
use crate::money::{from_amount, to_amount};
use crate::notifier::{LedgerEvent, Notifier};
use crate::store::{Deposit, DepositStore};
use tracing::info;

#[derive(Clone)]
pub struct DepositProcessor {
    deposits: DepositStore,
    notifier: Notifier,
}

impl DepositProcessor {
    pub fn new(deposits: DepositStore, notifier: Notifier) -> Self {
        Self { deposits, notifier }
    }

    /// Record a claimed deposit. Nothing is credited until an admin approves.
    pub async fn submit(
        &self,
        owner_id: &str,
        amount: f64,
        proof_reference: &str,
    ) -> LedgerResult<Deposit> {
        let proof = proof_reference.trim();
        if proof.is_empty() {
            return Err(LedgerError::Validation(
                "proof reference required".to_string(),
            ));
        }
        if !(amount.is_finite() && amount > 0.0) {
            return Err(LedgerError::Validation("invalid amount".to_string()));
        }

        let deposit = self.deposits.submit(owner_id, to_amount(amount), proof).await?;
        info!(
            "🧾 Deposit {} submitted: {} (proof {})",
            deposit.id,
            from_amount(deposit.amount),
            deposit.proof_reference
        );
        Ok(deposit)
    }

    /// Admin decision on a pending deposit. Approval credits the wallet.
    pub async fn decide(
        &self,
        admin_id: &str,
        deposit_id: &str,
        approve: bool,
        note: Option<String>,
    ) -> LedgerResult<Deposit> {
        let note = note.unwrap_or_default();
        let deposit = self
            .deposits
            .decide(deposit_id, approve, &note, admin_id)
            .await?;

        let kind = if approve {
            "deposit_approved"
        } else {
            "deposit_rejected"
        };
        self.notifier.publish(LedgerEvent::new(
            kind,
            &deposit.owner_id,
            &deposit.id,
            deposit.amount,
            if note.is_empty() {
                format!("Deposit {}", deposit.status)
            } else {
                note
            },
        ));

        if approve {
            info!("✅ Deposit {} approved by {}", deposit.id, admin_id);
        } else {
            info!("🚫 Deposit {} rejected by {}", deposit.id, admin_id);
        }
        Ok(deposit)
    }

    pub async fn my_deposits(&self, owner_id: &str) -> LedgerResult<Vec<Deposit>> {
        self.deposits.list_by_owner(owner_id).await
    }

    pub async fn all_deposits(
        &self,
        status: Option<&str>,
        limit: usize,
    ) -> LedgerResult<Vec<Deposit>> {
        self.deposits.list_all(status, limit).await
    }
}
