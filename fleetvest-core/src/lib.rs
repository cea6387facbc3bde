//! Shared domain primitives for the Fleetvest ledger service.

mod id;
mod policy;

pub use id::{AccountId, InvestmentId, ReferralId, TransactionId, VehicleId, WithdrawalId};
pub use policy::Policy;

use rust_decimal::Decimal;

/// Monetary amount in major currency units.
pub type Money = Decimal;
