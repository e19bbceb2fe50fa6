//! YieldVault backend library.
//!
//! Financial ledger and accrual engine for an investment platform: wallet
//! balances, yield-bearing plans, daily-return accrual, multi-level referral
//! commissions, and the withdrawal/deposit approval state machines.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod money;
pub mod notifier;
pub mod scheduler;
pub mod store;
