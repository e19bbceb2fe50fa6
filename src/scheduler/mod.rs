//! Background schedulers.
//!
//! Each scheduler is an explicit struct with injected dependencies and a
//! `run_tick` that can be driven synchronously in tests. `spawn` wraps the
//! tick in a tokio interval loop. Ticks are idempotent, so overlapping runs
//! and restarts are safe.

pub mod accrual;
pub mod auto_withdrawal;
pub mod payout;

pub use accrual::{AccrualScheduler, AccrualSummary};
pub use auto_withdrawal::{AutoWithdrawalScheduler, AutoWithdrawalSummary};
pub use payout::{ManualPayoutGateway, PayoutGateway};
