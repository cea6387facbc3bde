//! Account ledger records and the atomic mutation engine behind Fleetvest.
//!
//! Mutations are planned as pure functions over freshly-read record state
//! (`plan`) and executed by a storage vault (`sqlite`) inside a single
//! transaction, so every logical operation is all-or-nothing.

mod error;
mod plan;
mod query;
mod record;
mod referral;
mod sqlite;
mod vault;

pub use error::{LedgerError, LedgerResult};
pub use plan::{
    plan_deposit, plan_investment, plan_maturity, plan_signup, plan_withdrawal_approval,
    plan_withdrawal_rejection, plan_withdrawal_request, DepositPlan, InvestmentPlan, MaturityPlan,
    ReferralContext, ReferralPayout, SignupPlan, SignupRequest, WithdrawalApprovalPlan,
};
pub use query::{TransactionQuery, WithdrawalQuery};
pub use record::{
    Account, Investment, InvestmentStatus, Referral, ReferralStatus, TransactionKind,
    TransactionRecord, UnmatchedDeposit, Vehicle, VehicleStatus, WithdrawalRequest,
    WithdrawalStatus,
};
pub use referral::generate_referral_code;
pub use sqlite::SqliteVault;
pub use vault::{DepositOutcome, NewVehicle, Vault, VehicleUpdate, WithdrawalListing};
