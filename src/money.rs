//! Fixed-point money arithmetic.
//!
//! Every balance, principal, and commission is stored as an integer number of
//! micro-dollars so that accrual and commission math never drifts the way f64
//! arithmetic does. f64 dollars exist only at the JSON boundary.

/// Fixed-point amount with 6 decimal places (micro-dollars).
/// Fits SQLite INTEGER columns directly.
pub type Amount = i64;

/// Conversion factor: 1 dollar = 1_000_000 units.
pub const AMOUNT_SCALE: i64 = 1_000_000;

/// Convert f64 dollars to fixed-point Amount.
#[inline]
pub fn to_amount(value: f64) -> Amount {
    (value * AMOUNT_SCALE as f64).round() as Amount
}

/// Convert fixed-point Amount to f64 dollars.
#[inline]
pub fn from_amount(amount: Amount) -> f64 {
    amount as f64 / AMOUNT_SCALE as f64
}

/// Take a basis-point slice of an amount (100 bps = 1%).
///
/// Uses i128 for the intermediate product so large principals cannot
/// overflow, then truncates toward zero like the storage layer expects.
#[inline]
pub fn bps_of(amount: Amount, bps: i64) -> Amount {
    ((amount as i128 * bps as i128) / 10_000) as Amount
}

/// Take a whole-percent slice of an amount.
#[inline]
pub fn percent_of(amount: Amount, percent: i64) -> Amount {
    bps_of(amount, percent * 100)
}
