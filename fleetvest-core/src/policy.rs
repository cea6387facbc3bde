use rust_decimal::Decimal;
use serde::Deserialize;

/// Business policy knobs applied by the ledger.
///
/// Defaults mirror the launch configuration; deployments may override any
/// field through the configuration layer.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Policy {
    /// Smallest withdrawal amount a user may request, in major units.
    pub min_withdrawal: Decimal,
    /// Share of a referred account's first investment paid to the referrer.
    pub commission_rate: Decimal,
    /// Welcome credit applied when an account is opened.
    pub signup_bonus: Decimal,
    /// Fixed investment term in months.
    pub term_months: u32,
    /// Minimum length of the payout details string (mobile money number).
    pub min_payout_details_len: usize,
    /// Minimum password length accepted at signup.
    pub min_password_len: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            min_withdrawal: Decimal::new(100, 0),
            commission_rate: Decimal::new(30, 2),
            signup_bonus: Decimal::new(10, 0),
            term_months: 12,
            min_payout_details_len: 10,
            min_password_len: 8,
        }
    }
}
