//! Financial operations composed from the stores.
//!
//! Each struct here owns one workflow (investing, referrals, withdrawals,
//! deposits), validates input, and emits notifications. Handlers and
//! schedulers talk to these, never to SQL directly.

pub mod deposits;
pub mod earnings;
pub mod investing;
pub mod referrals;
pub mod withdrawals;

pub use deposits::DepositProcessor;
pub use earnings::AdEarnings;
pub use investing::{InvestmentLedger, COMMISSION_BPS};
pub use referrals::{ReferralProgram, ReferralSummary};
pub use withdrawals::WithdrawalProcessor;
