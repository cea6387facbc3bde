//! End-to-end exercise of the ledger over a real on-disk vault: signup
//! with referral, deposit, investment with commission, maturity, and the
//! withdrawal approval workflow.

use chrono::{Months, Utc};
use fleetvest_ledger::{
    NewVehicle, SignupRequest, SqliteVault, TransactionKind, TransactionQuery, Vault,
    WithdrawalQuery, WithdrawalStatus,
};
use rust_decimal_macros::dec;
use tempfile::tempdir;

fn signup(name: &str, email: &str, code: Option<&str>) -> SignupRequest {
    SignupRequest {
        name: name.into(),
        email: email.into(),
        phone: "0551234567".into(),
        password: "longenough".into(),
        referral_code: code.map(str::to_owned),
    }
}

#[test]
fn referred_investor_full_lifecycle() {
    let dir = tempdir().unwrap();
    let vault = SqliteVault::new(dir.path().join("vault.db")).unwrap();

    let referrer = vault
        .open_account(&signup("Yaw Owusu", "yaw@example.com", None))
        .unwrap();
    let investor = vault
        .open_account(&signup(
            "Akosua Boateng",
            "akosua@example.com",
            Some(&referrer.referral_code),
        ))
        .unwrap();

    // Signup bonus is on both ledgers.
    let bonuses = vault
        .transactions(
            &investor.id,
            TransactionQuery::default().with_kind(TransactionKind::SignupBonus),
        )
        .unwrap();
    assert_eq!(bonuses.len(), 1);
    assert_eq!(bonuses[0].amount, dec!(10));
    assert_eq!(bonuses[0].balance_after, dec!(10));

    // Confirmed deposit funds the first investment.
    vault
        .apply_deposit(&investor.id, dec!(990), "ps_ref_seed")
        .unwrap();
    let vehicle = vault
        .add_vehicle(&NewVehicle {
            name: "Toyota Corolla 2022".into(),
            description: "City rental workhorse".into(),
            total_value: dec!(20000),
            roi: dec!(15),
        })
        .unwrap();
    let position = vault
        .apply_investment(&investor.id, &vehicle.id, dec!(300))
        .unwrap();
    assert_eq!(position.roi, dec!(15));

    // 30% commission landed on the referrer, exactly once.
    let paid = vault.account(&referrer.id).unwrap().unwrap();
    assert_eq!(paid.balance, dec!(100));
    assert_eq!(paid.total_earned, dec!(100));
    assert_eq!(paid.referral_earnings, dec!(90));
    vault
        .apply_investment(&investor.id, &vehicle.id, dec!(200))
        .unwrap();
    let paid = vault.account(&referrer.id).unwrap().unwrap();
    assert_eq!(paid.referral_earnings, dec!(90));

    // Twelve months later both positions mature.
    let later = Utc::now() + Months::new(13);
    let matured = vault.mature_investments(&investor.id, later).unwrap();
    assert_eq!(matured.len(), 2);
    let investor_now = vault.account(&investor.id).unwrap().unwrap();
    // 10 bonus + 45 + 30 profit.
    assert_eq!(investor_now.total_earned, dec!(85));
    // 10 + 990 - 500 invested + 500 principal back + 75 profit.
    assert_eq!(investor_now.balance, dec!(1075));

    // Referrer withdraws the commission.
    let request = vault
        .request_withdrawal(&referrer.id, dec!(100), "0249876543")
        .unwrap();
    let pending = vault.withdrawals(WithdrawalQuery::pending()).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].account_name, "Yaw Owusu");

    let processed = vault.approve_withdrawal(&request.id).unwrap();
    assert_eq!(processed.status, WithdrawalStatus::Processed);
    let referrer_now = vault.account(&referrer.id).unwrap().unwrap();
    assert_eq!(referrer_now.balance, dec!(0));
    assert_eq!(referrer_now.total_earned, dec!(0));
    let withdrawal_entries = vault
        .transactions(
            &referrer.id,
            TransactionQuery::default().with_kind(TransactionKind::Withdrawal),
        )
        .unwrap();
    assert_eq!(withdrawal_entries.len(), 1);
    assert_eq!(withdrawal_entries[0].balance_after, dec!(0));
}

#[test]
fn ledger_history_is_ordered_and_filterable() {
    let dir = tempdir().unwrap();
    let vault = SqliteVault::new(dir.path().join("vault.db")).unwrap();
    let account = vault
        .open_account(&signup("Esi Appiah", "esi@example.com", None))
        .unwrap();
    for i in 0..5 {
        vault
            .apply_deposit(&account.id, dec!(100), &format!("ref-{i}"))
            .unwrap();
    }

    let newest_first = vault
        .transactions(&account.id, TransactionQuery::default())
        .unwrap();
    assert_eq!(newest_first.len(), 6); // signup bonus + 5 deposits
    assert_eq!(newest_first[0].description, "Deposit confirmed. Ref: ref-4");

    let limited = vault
        .transactions(
            &account.id,
            TransactionQuery::default()
                .with_kind(TransactionKind::Deposit)
                .oldest_first()
                .with_limit(2),
        )
        .unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].description, "Deposit confirmed. Ref: ref-0");
    assert_eq!(limited[0].balance_after, dec!(110));
}
