use chrono::{DateTime, Utc};
use fleetvest_core::{
    AccountId, InvestmentId, Money, ReferralId, TransactionId, VehicleId, WithdrawalId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Top-level account record holding the spendable balance and the
/// cumulative counters every ledger operation is validated against.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Spendable funds. Never negative after a committed operation.
    pub balance: Money,
    /// Realized profit plus bonuses. Withdrawals draw against this, and
    /// only an approved withdrawal may decrease it.
    pub total_earned: Money,
    /// Cumulative principal committed to investments.
    pub total_invested: Money,
    pub referral_code: String,
    pub referral_earnings: Money,
    pub referred_by: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Vehicle listed for fractional investment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub name: String,
    pub description: String,
    pub total_value: Money,
    /// Sum of principal from all investments against this vehicle.
    /// Invariant: `invested_amount <= total_value`.
    pub invested_amount: Money,
    /// Annual return rate in percent, snapshotted onto each investment.
    pub roi: Decimal,
    pub status: VehicleStatus,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    /// Remaining principal the vehicle can still absorb.
    pub fn remaining_capacity(&self) -> Money {
        self.total_value - self.invested_amount
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VehicleStatus {
    Available,
    FullyInvested,
}

impl VehicleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VehicleStatus::Available => "available",
            VehicleStatus::FullyInvested => "fully-invested",
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(VehicleStatus::Available),
            "fully-invested" => Ok(VehicleStatus::FullyInvested),
            other => Err(format!("unknown vehicle status: {other}")),
        }
    }
}

/// Investment position. Immutable once created except for the maturity
/// transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Investment {
    pub id: InvestmentId,
    pub account_id: AccountId,
    pub vehicle_id: VehicleId,
    /// Vehicle name at the time of investment, kept for display even if
    /// the vehicle is later delisted.
    pub vehicle_name: String,
    pub amount: Money,
    /// ROI percentage captured when the position was opened.
    pub roi: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: InvestmentStatus,
}

impl Investment {
    /// Profit this position pays out at maturity.
    pub fn projected_profit(&self) -> Money {
        self.amount * self.roi / Decimal::ONE_HUNDRED
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentStatus {
    Active,
    Matured,
}

impl InvestmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvestmentStatus::Active => "active",
            InvestmentStatus::Matured => "matured",
        }
    }
}

impl fmt::Display for InvestmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvestmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(InvestmentStatus::Active),
            "matured" => Ok(InvestmentStatus::Matured),
            other => Err(format!("unknown investment status: {other}")),
        }
    }
}

/// Append-only ledger line. Every balance-affecting operation writes one
/// of these with the balance snapshot taken immediately after the change.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub amount: Money,
    pub balance_after: Money,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(
        account_id: AccountId,
        kind: TransactionKind,
        amount: Money,
        balance_after: Money,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            account_id,
            kind,
            amount,
            balance_after,
            description: description.into(),
            created_at,
        }
    }
}

/// Enumerates the supported ledger line item categories.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    Deposit,
    Investment,
    Withdrawal,
    ReferralBonus,
    SignupBonus,
    Profit,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Investment => "investment",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::ReferralBonus => "referral-bonus",
            TransactionKind::SignupBonus => "signup-bonus",
            TransactionKind::Profit => "profit",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionKind::Deposit),
            "investment" => Ok(TransactionKind::Investment),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            "referral-bonus" => Ok(TransactionKind::ReferralBonus),
            "signup-bonus" => Ok(TransactionKind::SignupBonus),
            "profit" => Ok(TransactionKind::Profit),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

/// Referrer/referred relationship. Created once at signup, never reparented.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Referral {
    pub id: ReferralId,
    pub referrer_id: AccountId,
    pub referred_id: AccountId,
    pub referred_name: String,
    pub referred_email: String,
    pub commission_rate: Decimal,
    /// Grows only when the referred account's first investment pays out.
    pub earned: Money,
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Active,
}

impl ReferralStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferralStatus::Active => "active",
        }
    }
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferralStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ReferralStatus::Active),
            other => Err(format!("unknown referral status: {other}")),
        }
    }
}

/// Withdrawal request lifecycle record. Only `pending` is mutable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    pub account_id: AccountId,
    pub amount: Money,
    pub method: String,
    pub details: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Processed,
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processed => "processed",
            WithdrawalStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, WithdrawalStatus::Pending)
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "processed" => Ok(WithdrawalStatus::Processed),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            other => Err(format!("unknown withdrawal status: {other}")),
        }
    }
}

/// Deposit confirmation the gateway could not attribute to an account.
/// Held for manual reconciliation instead of being dropped.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnmatchedDeposit {
    pub reference: String,
    pub amount: Money,
    pub metadata: Option<serde_json::Value>,
    pub received_at: DateTime<Utc>,
}
