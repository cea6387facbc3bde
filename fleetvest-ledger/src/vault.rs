use chrono::{DateTime, Utc};
use fleetvest_core::{AccountId, Money, VehicleId, WithdrawalId};
use rust_decimal::Decimal;

use crate::plan::SignupRequest;
use crate::record::{
    Account, Investment, Referral, TransactionRecord, UnmatchedDeposit, Vehicle,
    WithdrawalRequest,
};
use crate::{LedgerResult, TransactionQuery, WithdrawalQuery};

/// Result of applying a deposit for a payment-provider reference.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DepositOutcome {
    /// The balance was credited and a transaction appended.
    Applied,
    /// The reference was seen before; nothing changed.
    AlreadyApplied,
}

/// Input for listing a new vehicle in the catalog.
#[derive(Clone, Debug)]
pub struct NewVehicle {
    pub name: String,
    pub description: String,
    pub total_value: Money,
    pub roi: Decimal,
}

/// Field edits for a listed vehicle. `None` leaves the field unchanged.
#[derive(Clone, Debug, Default)]
pub struct VehicleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub total_value: Option<Money>,
    pub roi: Option<Decimal>,
}

/// Withdrawal request joined with the owner's display name for the admin
/// board.
#[derive(Clone, Debug)]
pub struct WithdrawalListing {
    pub request: WithdrawalRequest,
    pub account_name: String,
}

/// Abstraction over the durable store behind the ledger.
///
/// Every mutating method applies its full effect as a single atomic unit
/// against freshly-read state: either every record change commits or none
/// does, and preconditions are checked inside that unit, never against a
/// caller-supplied snapshot.
pub trait Vault: Send + Sync {
    // Mutations.

    /// Open an account, applying the signup bonus and, when a referral
    /// code is supplied, recording the (immutable) referral relationship.
    /// Fails if the code resolves to no account.
    fn open_account(&self, request: &SignupRequest) -> LedgerResult<Account>;

    /// Credit a confirmed deposit. Idempotent per provider reference.
    fn apply_deposit(
        &self,
        account: &AccountId,
        amount: Money,
        reference: &str,
    ) -> LedgerResult<DepositOutcome>;

    /// Queue a confirmed deposit that carried no account id. Idempotent
    /// per provider reference.
    fn record_unmatched_deposit(
        &self,
        reference: &str,
        amount: Money,
        metadata: Option<&serde_json::Value>,
    ) -> LedgerResult<()>;

    /// Commit principal to a vehicle, paying the one-time referral
    /// commission when this is the account's first investment.
    fn apply_investment(
        &self,
        account: &AccountId,
        vehicle: &VehicleId,
        amount: Money,
    ) -> LedgerResult<Investment>;

    /// File a withdrawal request. No funds move until approval.
    fn request_withdrawal(
        &self,
        account: &AccountId,
        amount: Money,
        details: &str,
    ) -> LedgerResult<WithdrawalRequest>;

    /// pending -> processed; debits balance and total earned.
    fn approve_withdrawal(&self, request: &WithdrawalId) -> LedgerResult<WithdrawalRequest>;

    /// pending -> rejected; no funds move.
    fn reject_withdrawal(&self, request: &WithdrawalId) -> LedgerResult<WithdrawalRequest>;

    /// Mature every active investment of the account whose end date has
    /// passed. Returns the positions that transitioned.
    fn mature_investments(
        &self,
        account: &AccountId,
        now: DateTime<Utc>,
    ) -> LedgerResult<Vec<Investment>>;

    /// List a vehicle for investment.
    fn add_vehicle(&self, vehicle: &NewVehicle) -> LedgerResult<Vehicle>;

    /// Edit a listed vehicle. The total value may not drop below the
    /// principal already invested; an ROI change only affects future
    /// positions, existing ones keep their snapshot.
    fn update_vehicle(
        &self,
        vehicle: &VehicleId,
        changes: &VehicleUpdate,
    ) -> LedgerResult<Vehicle>;

    /// Delist a vehicle. Refused while principal is invested against it.
    fn remove_vehicle(&self, vehicle: &VehicleId) -> LedgerResult<()>;

    // Reads.

    fn account(&self, id: &AccountId) -> LedgerResult<Option<Account>>;
    fn accounts(&self) -> LedgerResult<Vec<Account>>;
    fn account_by_email(&self, email: &str) -> LedgerResult<Option<Account>>;
    fn account_by_referral_code(&self, code: &str) -> LedgerResult<Option<Account>>;
    fn vehicle(&self, id: &VehicleId) -> LedgerResult<Option<Vehicle>>;
    fn vehicles(&self) -> LedgerResult<Vec<Vehicle>>;
    fn transactions(
        &self,
        account: &AccountId,
        query: TransactionQuery,
    ) -> LedgerResult<Vec<TransactionRecord>>;
    fn investments(&self, account: &AccountId) -> LedgerResult<Vec<Investment>>;
    fn referrals(&self, referrer: &AccountId) -> LedgerResult<Vec<Referral>>;
    fn withdrawals(&self, query: WithdrawalQuery) -> LedgerResult<Vec<WithdrawalListing>>;
    fn unmatched_deposits(&self) -> LedgerResult<Vec<UnmatchedDeposit>>;
}
