//! Pure planning for ledger mutations.
//!
//! Each `plan_*` function takes freshly-read record state, validates the
//! operation's preconditions against it, and returns the full post-state
//! to persist. Planning never touches storage; the vault re-reads records
//! inside a transaction, plans, writes, and commits as one unit.

use chrono::{DateTime, Months, Utc};
use fleetvest_core::{AccountId, InvestmentId, Money, Policy, ReferralId, WithdrawalId};
use rust_decimal::Decimal;

use crate::record::{
    Account, Investment, InvestmentStatus, Referral, ReferralStatus, TransactionKind,
    TransactionRecord, Vehicle, VehicleStatus, WithdrawalRequest, WithdrawalStatus,
};
use crate::referral::generate_referral_code;
use crate::{LedgerError, LedgerResult};

/// Validated signup input. The password is forwarded to the identity
/// provider by the caller and never persisted by the ledger.
#[derive(Clone, Debug)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub referral_code: Option<String>,
}

impl SignupRequest {
    pub fn validate(&self, policy: &Policy) -> LedgerResult<()> {
        if self.name.trim().is_empty() {
            return Err(LedgerError::validation("name is required"));
        }
        if self.phone.trim().is_empty() {
            return Err(LedgerError::validation("phone number is required"));
        }
        if !looks_like_email(&self.email) {
            return Err(LedgerError::validation("invalid email address"));
        }
        if self.password.chars().count() < policy.min_password_len {
            return Err(LedgerError::validation(format!(
                "password must be at least {} characters",
                policy.min_password_len
            )));
        }
        Ok(())
    }
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

/// Everything written when an account is opened.
#[derive(Clone, Debug)]
pub struct SignupPlan {
    pub account: Account,
    pub bonus_entry: TransactionRecord,
    pub referral: Option<Referral>,
}

/// Plan account creation with the signup bonus applied.
///
/// `referrer` must be the account resolved from the supplied referral code;
/// resolving the code (and failing signup when it matches nothing) is the
/// vault's responsibility.
pub fn plan_signup(
    request: &SignupRequest,
    referrer: Option<&Account>,
    policy: &Policy,
    now: DateTime<Utc>,
) -> LedgerResult<SignupPlan> {
    request.validate(policy)?;

    let account = Account {
        id: AccountId::generate(),
        name: request.name.trim().to_owned(),
        email: request.email.trim().to_owned(),
        phone: request.phone.trim().to_owned(),
        balance: policy.signup_bonus,
        total_earned: policy.signup_bonus,
        total_invested: Decimal::ZERO,
        referral_code: generate_referral_code(),
        referral_earnings: Decimal::ZERO,
        referred_by: referrer.map(|r| r.id.clone()),
        created_at: now,
        updated_at: now,
    };

    let bonus_entry = TransactionRecord::new(
        account.id.clone(),
        TransactionKind::SignupBonus,
        policy.signup_bonus,
        account.balance,
        "Welcome bonus for signing up.",
        now,
    );

    let referral = referrer.map(|referrer| Referral {
        id: ReferralId::generate(),
        referrer_id: referrer.id.clone(),
        referred_id: account.id.clone(),
        referred_name: account.name.clone(),
        referred_email: account.email.clone(),
        commission_rate: policy.commission_rate,
        earned: Decimal::ZERO,
        status: ReferralStatus::Active,
        created_at: now,
    });

    Ok(SignupPlan {
        account,
        bonus_entry,
        referral,
    })
}

/// Post-state written when a deposit is confirmed.
#[derive(Clone, Debug)]
pub struct DepositPlan {
    pub account: Account,
    pub entry: TransactionRecord,
}

pub fn plan_deposit(
    account: &Account,
    amount: Money,
    reference: &str,
    now: DateTime<Utc>,
) -> LedgerResult<DepositPlan> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation("deposit amount must be positive"));
    }
    let mut account = account.clone();
    account.balance += amount;
    account.updated_at = now;

    let entry = TransactionRecord::new(
        account.id.clone(),
        TransactionKind::Deposit,
        amount,
        account.balance,
        format!("Deposit confirmed. Ref: {reference}"),
        now,
    );
    Ok(DepositPlan { account, entry })
}

/// Referrer-side writes triggered by a referred account's first investment.
#[derive(Clone, Debug)]
pub struct ReferralPayout {
    pub referrer: Account,
    pub entry: TransactionRecord,
    /// Updated referral row; `None` when the relationship record is
    /// missing (the commission is still paid).
    pub referral: Option<Referral>,
    pub commission: Money,
}

/// Referrer state handed to [`plan_investment`] when the investor was
/// referred.
#[derive(Clone, Copy, Debug)]
pub struct ReferralContext<'a> {
    pub referrer: &'a Account,
    pub referral: Option<&'a Referral>,
}

/// Post-state written when principal is committed to a vehicle.
#[derive(Clone, Debug)]
pub struct InvestmentPlan {
    pub account: Account,
    pub vehicle: Vehicle,
    pub investment: Investment,
    pub entry: TransactionRecord,
    pub payout: Option<ReferralPayout>,
}

pub fn plan_investment(
    account: &Account,
    vehicle: &Vehicle,
    referral_ctx: Option<ReferralContext<'_>>,
    amount: Money,
    policy: &Policy,
    now: DateTime<Utc>,
) -> LedgerResult<InvestmentPlan> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation(
            "investment amount must be positive",
        ));
    }
    if account.balance < amount {
        return Err(LedgerError::precondition(
            "insufficient balance for this investment",
        ));
    }
    if vehicle.status == VehicleStatus::FullyInvested {
        return Err(LedgerError::precondition("vehicle is fully funded"));
    }
    if vehicle.invested_amount + amount > vehicle.total_value {
        return Err(LedgerError::precondition(format!(
            "investment exceeds remaining vehicle capacity of {}",
            vehicle.remaining_capacity()
        )));
    }

    let first_investment = account.total_invested.is_zero();

    let mut account = account.clone();
    account.balance -= amount;
    account.total_invested += amount;
    account.updated_at = now;

    let mut vehicle = vehicle.clone();
    vehicle.invested_amount += amount;
    if vehicle.invested_amount == vehicle.total_value {
        vehicle.status = VehicleStatus::FullyInvested;
    }

    let end_date = now
        .checked_add_months(Months::new(policy.term_months))
        .ok_or_else(|| LedgerError::validation("investment term overflows the calendar"))?;

    let investment = Investment {
        id: InvestmentId::generate(),
        account_id: account.id.clone(),
        vehicle_id: vehicle.id.clone(),
        vehicle_name: vehicle.name.clone(),
        amount,
        roi: vehicle.roi,
        start_date: now,
        end_date,
        status: InvestmentStatus::Active,
    };

    let entry = TransactionRecord::new(
        account.id.clone(),
        TransactionKind::Investment,
        amount,
        account.balance,
        format!("Investment in {}", vehicle.name),
        now,
    );

    // Commission is owed exactly once, on the first committed principal.
    let payout = match (first_investment, account.referred_by.as_ref(), referral_ctx) {
        (true, Some(_), Some(ctx)) => {
            Some(plan_referral_payout(ctx, &account, amount, policy, now))
        }
        _ => None,
    };

    Ok(InvestmentPlan {
        account,
        vehicle,
        investment,
        entry,
        payout,
    })
}

fn plan_referral_payout(
    ctx: ReferralContext<'_>,
    investor: &Account,
    amount: Money,
    policy: &Policy,
    now: DateTime<Utc>,
) -> ReferralPayout {
    let rate = ctx
        .referral
        .map(|r| r.commission_rate)
        .unwrap_or(policy.commission_rate);
    let commission = amount * rate;

    let mut referrer = ctx.referrer.clone();
    referrer.balance += commission;
    referrer.total_earned += commission;
    referrer.referral_earnings += commission;
    referrer.updated_at = now;

    let entry = TransactionRecord::new(
        referrer.id.clone(),
        TransactionKind::ReferralBonus,
        commission,
        referrer.balance,
        format!(
            "{}% commission from {}'s first investment.",
            (rate * Decimal::ONE_HUNDRED).normalize(),
            investor.name
        ),
        now,
    );

    let referral = ctx.referral.map(|referral| {
        let mut referral = referral.clone();
        referral.earned += commission;
        referral
    });

    ReferralPayout {
        referrer,
        entry,
        referral,
        commission,
    }
}

pub fn plan_withdrawal_request(
    account: &Account,
    amount: Money,
    details: &str,
    policy: &Policy,
    now: DateTime<Utc>,
) -> LedgerResult<WithdrawalRequest> {
    if amount < policy.min_withdrawal {
        return Err(LedgerError::validation(format!(
            "minimum withdrawal is {}",
            policy.min_withdrawal
        )));
    }
    if details.trim().chars().count() < policy.min_payout_details_len {
        return Err(LedgerError::validation(
            "please provide a valid mobile money number",
        ));
    }
    if account.total_earned < amount {
        return Err(LedgerError::precondition(format!(
            "you can only withdraw up to your total profit of {}",
            account.total_earned
        )));
    }

    Ok(WithdrawalRequest {
        id: WithdrawalId::generate(),
        account_id: account.id.clone(),
        amount,
        method: "momo".to_owned(),
        details: details.trim().to_owned(),
        status: WithdrawalStatus::Pending,
        created_at: now,
        processed_at: None,
    })
}

/// Post-state written when a pending withdrawal is approved.
#[derive(Clone, Debug)]
pub struct WithdrawalApprovalPlan {
    pub account: Account,
    pub request: WithdrawalRequest,
    pub entry: TransactionRecord,
}

/// Approval re-validates against fresh account state: balances may have
/// moved since the request was filed.
pub fn plan_withdrawal_approval(
    account: &Account,
    request: &WithdrawalRequest,
    now: DateTime<Utc>,
) -> LedgerResult<WithdrawalApprovalPlan> {
    ensure_pending(request)?;
    if account.balance < request.amount {
        return Err(LedgerError::precondition("insufficient user balance"));
    }
    if account.total_earned < request.amount {
        return Err(LedgerError::precondition(
            "withdrawal amount exceeds total profit",
        ));
    }

    let mut account = account.clone();
    account.balance -= request.amount;
    account.total_earned -= request.amount;
    account.updated_at = now;

    let mut request = request.clone();
    request.status = WithdrawalStatus::Processed;
    request.processed_at = Some(now);

    let entry = TransactionRecord::new(
        account.id.clone(),
        TransactionKind::Withdrawal,
        request.amount,
        account.balance,
        format!("Withdrawal to {}", request.details),
        now,
    );

    Ok(WithdrawalApprovalPlan {
        account,
        request,
        entry,
    })
}

pub fn plan_withdrawal_rejection(
    request: &WithdrawalRequest,
    now: DateTime<Utc>,
) -> LedgerResult<WithdrawalRequest> {
    ensure_pending(request)?;
    let mut request = request.clone();
    request.status = WithdrawalStatus::Rejected;
    request.processed_at = Some(now);
    Ok(request)
}

fn ensure_pending(request: &WithdrawalRequest) -> LedgerResult<()> {
    if request.status.is_terminal() {
        return Err(LedgerError::precondition(format!(
            "withdrawal request is already {}",
            request.status
        )));
    }
    Ok(())
}

/// Post-state written when an active investment reaches its end date.
#[derive(Clone, Debug)]
pub struct MaturityPlan {
    pub account: Account,
    pub investment: Investment,
    pub entry: TransactionRecord,
}

/// Returns principal plus the snapshotted ROI to the balance; only the
/// profit share counts toward `total_earned`.
pub fn plan_maturity(
    account: &Account,
    investment: &Investment,
    now: DateTime<Utc>,
) -> LedgerResult<MaturityPlan> {
    if investment.status == InvestmentStatus::Matured {
        return Err(LedgerError::precondition("investment has already matured"));
    }
    if investment.end_date > now {
        return Err(LedgerError::precondition(
            "investment has not reached its end date",
        ));
    }

    let profit = investment.projected_profit();
    let credited = investment.amount + profit;

    let mut account = account.clone();
    account.balance += credited;
    account.total_earned += profit;
    account.updated_at = now;

    let mut investment = investment.clone();
    investment.status = InvestmentStatus::Matured;

    let entry = TransactionRecord::new(
        account.id.clone(),
        TransactionKind::Profit,
        credited,
        account.balance,
        format!(
            "Investment in {} matured: principal {} plus profit {}",
            investment.vehicle_name, investment.amount, profit
        ),
        now,
    );

    Ok(MaturityPlan {
        account,
        investment,
        entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetvest_core::{AccountId, VehicleId};
    use rust_decimal_macros::dec;

    fn sample_account(balance: Money, total_invested: Money) -> Account {
        Account {
            id: AccountId::generate(),
            name: "Ama Mensah".into(),
            email: "ama@example.com".into(),
            phone: "0551234567".into(),
            balance,
            total_earned: dec!(10),
            total_invested,
            referral_code: "ABCD2345".into(),
            referral_earnings: Decimal::ZERO,
            referred_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_vehicle(total_value: Money, invested: Money) -> Vehicle {
        Vehicle {
            id: VehicleId::generate(),
            name: "Toyota Corolla 2022".into(),
            description: "City rental workhorse".into(),
            total_value,
            invested_amount: invested,
            roi: dec!(15),
            status: VehicleStatus::Available,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn deposit_moves_balance_and_snapshots_it() {
        let account = sample_account(dec!(50), Decimal::ZERO);
        let plan = plan_deposit(&account, dec!(200), "ps_ref_1", Utc::now()).unwrap();
        assert_eq!(plan.account.balance, dec!(250));
        assert_eq!(plan.entry.balance_after, dec!(250));
        assert_eq!(plan.entry.kind, TransactionKind::Deposit);
        assert!(plan.entry.description.contains("ps_ref_1"));
    }

    #[test]
    fn deposit_rejects_non_positive_amounts() {
        let account = sample_account(dec!(50), Decimal::ZERO);
        let err = plan_deposit(&account, Decimal::ZERO, "r", Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn investment_with_zero_balance_fails_cleanly() {
        let account = sample_account(Decimal::ZERO, Decimal::ZERO);
        let vehicle = sample_vehicle(dec!(10000), Decimal::ZERO);
        let err = plan_investment(
            &account,
            &vehicle,
            None,
            dec!(100),
            &Policy::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Precondition(_)));
    }

    #[test]
    fn investment_flips_vehicle_to_fully_invested_on_equality() {
        let account = sample_account(dec!(500), dec!(100));
        let vehicle = sample_vehicle(dec!(1000), dec!(700));
        let plan = plan_investment(
            &account,
            &vehicle,
            None,
            dec!(300),
            &Policy::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(plan.vehicle.invested_amount, dec!(1000));
        assert_eq!(plan.vehicle.status, VehicleStatus::FullyInvested);
        assert_eq!(plan.account.balance, dec!(200));
        assert_eq!(plan.investment.roi, dec!(15));
        assert!(plan.payout.is_none());
    }

    #[test]
    fn investment_cannot_overfill_a_vehicle() {
        let account = sample_account(dec!(500), Decimal::ZERO);
        let vehicle = sample_vehicle(dec!(1000), dec!(950));
        let err = plan_investment(
            &account,
            &vehicle,
            None,
            dec!(100),
            &Policy::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Precondition(_)));
    }

    #[test]
    fn first_investment_pays_referral_commission_once() {
        let referrer = sample_account(dec!(40), Decimal::ZERO);
        let mut investor = sample_account(dec!(600), Decimal::ZERO);
        investor.referred_by = Some(referrer.id.clone());
        let referral = Referral {
            id: ReferralId::generate(),
            referrer_id: referrer.id.clone(),
            referred_id: investor.id.clone(),
            referred_name: investor.name.clone(),
            referred_email: investor.email.clone(),
            commission_rate: dec!(0.30),
            earned: Decimal::ZERO,
            status: ReferralStatus::Active,
            created_at: Utc::now(),
        };
        let vehicle = sample_vehicle(dec!(10000), Decimal::ZERO);
        let ctx = ReferralContext {
            referrer: &referrer,
            referral: Some(&referral),
        };

        let plan = plan_investment(
            &investor,
            &vehicle,
            Some(ctx),
            dec!(300),
            &Policy::default(),
            Utc::now(),
        )
        .unwrap();
        let payout = plan.payout.expect("commission on first investment");
        assert_eq!(payout.commission, dec!(90));
        assert_eq!(payout.referrer.balance, dec!(130));
        assert_eq!(payout.referrer.total_earned, dec!(100));
        assert_eq!(payout.referrer.referral_earnings, dec!(90));
        assert_eq!(payout.referral.as_ref().unwrap().earned, dec!(90));
        assert_eq!(payout.entry.kind, TransactionKind::ReferralBonus);
        assert_eq!(payout.entry.balance_after, dec!(130));

        // A follow-up investment by the same account pays nothing further.
        let second = plan_investment(
            &plan.account,
            &plan.vehicle,
            Some(ctx),
            dec!(100),
            &Policy::default(),
            Utc::now(),
        )
        .unwrap();
        assert!(second.payout.is_none());
    }

    #[test]
    fn commission_without_a_referral_row_uses_the_configured_rate() {
        let referrer = sample_account(dec!(40), Decimal::ZERO);
        let mut investor = sample_account(dec!(600), Decimal::ZERO);
        investor.referred_by = Some(referrer.id.clone());
        let vehicle = sample_vehicle(dec!(10000), Decimal::ZERO);
        let ctx = ReferralContext {
            referrer: &referrer,
            referral: None,
        };
        let policy = Policy {
            commission_rate: dec!(0.10),
            ..Policy::default()
        };

        let plan = plan_investment(&investor, &vehicle, Some(ctx), dec!(300), &policy, Utc::now())
            .unwrap();
        let payout = plan.payout.expect("commission on first investment");
        assert_eq!(payout.commission, dec!(30));
        assert!(payout.referral.is_none());
    }

    #[test]
    fn withdrawal_request_enforces_minimum_and_profit_cap() {
        let account = sample_account(dec!(500), Decimal::ZERO);
        let policy = Policy::default();
        let err =
            plan_withdrawal_request(&account, dec!(50), "0551234567", &policy, Utc::now())
                .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        // total_earned is 10 in the fixture, below the requested 100.
        let err =
            plan_withdrawal_request(&account, dec!(100), "0551234567", &policy, Utc::now())
                .unwrap_err();
        assert!(matches!(err, LedgerError::Precondition(_)));
    }

    #[test]
    fn approval_debits_balance_and_profit_together() {
        let mut account = sample_account(dec!(400), Decimal::ZERO);
        account.total_earned = dec!(150);
        let request = plan_withdrawal_request(
            &account,
            dec!(100),
            "0551234567",
            &Policy::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(request.status, WithdrawalStatus::Pending);

        let plan = plan_withdrawal_approval(&account, &request, Utc::now()).unwrap();
        assert_eq!(plan.account.balance, dec!(300));
        assert_eq!(plan.account.total_earned, dec!(50));
        assert_eq!(plan.request.status, WithdrawalStatus::Processed);
        assert!(plan.request.processed_at.is_some());
        assert_eq!(plan.entry.kind, TransactionKind::Withdrawal);
        assert_eq!(plan.entry.balance_after, dec!(300));
    }

    #[test]
    fn terminal_requests_cannot_be_acted_on() {
        let mut account = sample_account(dec!(400), Decimal::ZERO);
        account.total_earned = dec!(150);
        let request = plan_withdrawal_request(
            &account,
            dec!(100),
            "0551234567",
            &Policy::default(),
            Utc::now(),
        )
        .unwrap();
        let approved = plan_withdrawal_approval(&account, &request, Utc::now()).unwrap();

        let err = plan_withdrawal_rejection(&approved.request, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::Precondition(_)));
        let err = plan_withdrawal_approval(&account, &approved.request, Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::Precondition(_)));
    }

    #[test]
    fn maturity_returns_principal_and_counts_only_profit_as_earned() {
        let account = sample_account(dec!(0), dec!(300));
        let vehicle = sample_vehicle(dec!(10000), dec!(300));
        let now = Utc::now();
        let investment = Investment {
            id: InvestmentId::generate(),
            account_id: account.id.clone(),
            vehicle_id: vehicle.id.clone(),
            vehicle_name: vehicle.name.clone(),
            amount: dec!(300),
            roi: dec!(15),
            start_date: now - Months::new(13),
            end_date: now - Months::new(1),
            status: InvestmentStatus::Active,
        };

        let plan = plan_maturity(&account, &investment, now).unwrap();
        assert_eq!(plan.account.balance, dec!(345));
        assert_eq!(plan.account.total_earned, dec!(55)); // 10 bonus + 45 profit
        assert_eq!(plan.investment.status, InvestmentStatus::Matured);
        assert_eq!(plan.entry.kind, TransactionKind::Profit);

        let err = plan_maturity(&plan.account, &plan.investment, now).unwrap_err();
        assert!(matches!(err, LedgerError::Precondition(_)));
    }

    #[test]
    fn signup_applies_bonus_and_records_referral() {
        let referrer = sample_account(dec!(40), Decimal::ZERO);
        let request = SignupRequest {
            name: "Kofi Asante".into(),
            email: "kofi@example.com".into(),
            phone: "0249876543".into(),
            password: "hunter2hunter2".into(),
            referral_code: Some(referrer.referral_code.clone()),
        };
        let plan = plan_signup(&request, Some(&referrer), &Policy::default(), Utc::now()).unwrap();
        assert_eq!(plan.account.balance, dec!(10));
        assert_eq!(plan.account.total_earned, dec!(10));
        assert_eq!(plan.account.referred_by, Some(referrer.id.clone()));
        assert_eq!(plan.bonus_entry.kind, TransactionKind::SignupBonus);
        assert_eq!(plan.bonus_entry.balance_after, dec!(10));
        let referral = plan.referral.expect("referral row for referred signup");
        assert_eq!(referral.referrer_id, referrer.id);
        assert_eq!(referral.earned, Decimal::ZERO);
    }

    #[test]
    fn signup_validation_rejects_bad_input() {
        let policy = Policy::default();
        let base = SignupRequest {
            name: "Kofi".into(),
            email: "kofi@example.com".into(),
            phone: "024000000".into(),
            password: "longenough".into(),
            referral_code: None,
        };

        let mut bad = base.clone();
        bad.email = "not-an-email".into();
        assert!(bad.validate(&policy).is_err());

        let mut bad = base.clone();
        bad.password = "short".into();
        assert!(bad.validate(&policy).is_err());

        let mut bad = base.clone();
        bad.name = "  ".into();
        assert!(bad.validate(&policy).is_err());

        assert!(base.validate(&policy).is_ok());
    }

    #[test]
    fn investment_term_runs_twelve_months() {
        let account = sample_account(dec!(500), Decimal::ZERO);
        let vehicle = sample_vehicle(dec!(10000), Decimal::ZERO);
        let now = Utc::now();
        let plan = plan_investment(&account, &vehicle, None, dec!(100), &Policy::default(), now)
            .unwrap();
        assert_eq!(
            plan.investment.end_date,
            now.checked_add_months(Months::new(12)).unwrap()
        );
    }
}
