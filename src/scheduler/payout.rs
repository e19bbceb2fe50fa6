//! External payout seam for auto-processed withdrawals.

use crate::store::Withdrawal;
use anyhow::Result;
use tracing::info;

/// Abstraction over the external payout rail. The auto-withdrawal scheduler
/// approves a withdrawal only after `send` succeeds; a failure turns the
/// withdrawal into a rejection with a refund.
#[async_trait::async_trait]
pub trait PayoutGateway: Send + Sync {
    async fn send(&self, withdrawal: &Withdrawal) -> Result<()>;
}

/// Default gateway: payouts are executed manually by operators, so approving
/// the withdrawal is the whole job. Always succeeds.
pub struct ManualPayoutGateway;

#[async_trait::async_trait]
impl PayoutGateway for ManualPayoutGateway {
    async fn send(&self, withdrawal: &Withdrawal) -> Result<()> {
        info!(
            "💸 Withdrawal {} queued for manual payout: {} on {}",
            withdrawal.id, withdrawal.address, withdrawal.network
        );
        Ok(())
    }
}
