use std::sync::Arc;

use fleetvest_core::AccountId;
use fleetvest_ledger::{DepositOutcome, LedgerError, Vault};
use tracing::{info, warn};

use crate::payload::{ProviderEvent, CHARGE_SUCCESS};
use crate::signature::verify_signature;

/// Outcome of one webhook delivery, mapped to an HTTP status by the server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Confirmation {
    /// Signature missing or wrong. Never retried.
    Unauthorized,
    /// Authentic but not a charge settlement (or unparseable); acknowledged
    /// so the provider stops redelivering.
    Ignored,
    /// Balance credited and transaction appended.
    Credited,
    /// Reference seen before; acknowledged without a second credit.
    AlreadyCredited,
    /// No account id in the metadata; held for manual reconciliation.
    QueuedForReconciliation,
    /// Transient failure; the provider should redeliver.
    Retry(String),
}

impl Confirmation {
    pub fn is_success(&self) -> bool {
        !matches!(self, Confirmation::Unauthorized | Confirmation::Retry(_))
    }
}

/// The sole authoritative path for marking a deposit as confirmed.
pub struct PaymentConfirmationHandler {
    vault: Arc<dyn Vault>,
    secret: String,
}

impl PaymentConfirmationHandler {
    pub fn new(vault: Arc<dyn Vault>, secret: impl Into<String>) -> Self {
        Self {
            vault,
            secret: secret.into(),
        }
    }

    /// Process one delivery: authenticate, then apply the deposit exactly
    /// once per provider reference.
    pub fn confirm(&self, signature: Option<&str>, body: &[u8]) -> Confirmation {
        let authentic = signature
            .map(|sig| verify_signature(&self.secret, body, sig))
            .unwrap_or(false);
        if !authentic {
            warn!("webhook delivery rejected: bad or missing signature");
            return Confirmation::Unauthorized;
        }

        let event: ProviderEvent = match serde_json::from_slice(body) {
            Ok(event) => event,
            Err(err) => {
                // Authentic but malformed; retrying cannot fix it.
                warn!(error = %err, "webhook body did not parse, acknowledging");
                return Confirmation::Ignored;
            }
        };
        if event.event != CHARGE_SUCCESS {
            return Confirmation::Ignored;
        }
        let Some(charge) = event.data else {
            warn!("charge event carried no data, acknowledging");
            return Confirmation::Ignored;
        };

        let amount = charge.amount_major();
        let reference = charge.reference.as_str();
        let Some(account_id) = charge.account_id() else {
            warn!(reference, "charge carried no user_id; queueing for reconciliation");
            return match self.vault.record_unmatched_deposit(
                reference,
                amount,
                charge.metadata.as_ref(),
            ) {
                Ok(()) => Confirmation::QueuedForReconciliation,
                Err(err) => Confirmation::Retry(err.to_string()),
            };
        };

        let account = AccountId::from(account_id);
        match self.vault.apply_deposit(&account, amount, reference) {
            Ok(DepositOutcome::Applied) => {
                info!(reference, account = account_id, %amount, "deposit confirmed");
                Confirmation::Credited
            }
            Ok(DepositOutcome::AlreadyApplied) => {
                info!(reference, "duplicate delivery ignored");
                Confirmation::AlreadyCredited
            }
            Err(LedgerError::Validation(reason)) => {
                warn!(reference, reason, "charge failed validation, acknowledging");
                Confirmation::Ignored
            }
            // Covers the unknown-account case: the account may be created
            // before the provider's next delivery, and the money must not
            // be dropped.
            Err(err) => {
                warn!(reference, error = %err, "deposit failed, requesting redelivery");
                Confirmation::Retry(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetvest_ledger::{SignupRequest, SqliteVault, TransactionKind, TransactionQuery};
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    use crate::signature::sign;

    const SECRET: &str = "whsec_test";

    fn handler() -> (tempfile::TempDir, Arc<SqliteVault>, PaymentConfirmationHandler) {
        let dir = tempdir().unwrap();
        let vault = Arc::new(SqliteVault::new(dir.path().join("vault.db")).unwrap());
        let handler = PaymentConfirmationHandler::new(vault.clone(), SECRET);
        (dir, vault, handler)
    }

    fn open_account(vault: &SqliteVault) -> fleetvest_ledger::Account {
        vault
            .open_account(&SignupRequest {
                name: "Ama".into(),
                email: "ama@example.com".into(),
                phone: "0551234567".into(),
                password: "longenough".into(),
                referral_code: None,
            })
            .unwrap()
    }

    fn charge_body(account: &str, reference: &str, minor: i64) -> Vec<u8> {
        serde_json::json!({
            "event": "charge.success",
            "data": {
                "amount": minor,
                "reference": reference,
                "metadata": { "user_id": account }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn bad_signature_is_unauthorized() {
        let (_dir, vault, handler) = handler();
        let account = open_account(&vault);
        let body = charge_body(account.id.as_str(), "r1", 10000);

        assert_eq!(
            handler.confirm(Some("deadbeef"), &body),
            Confirmation::Unauthorized
        );
        assert_eq!(handler.confirm(None, &body), Confirmation::Unauthorized);
        let account = vault.account(&account.id).unwrap().unwrap();
        assert_eq!(account.balance, dec!(10)); // untouched signup bonus
    }

    #[test]
    fn redelivery_credits_exactly_once() {
        let (_dir, vault, handler) = handler();
        let account = open_account(&vault);
        let body = charge_body(account.id.as_str(), "r1", 25000);
        let sig = sign(SECRET, &body);

        assert_eq!(handler.confirm(Some(&sig), &body), Confirmation::Credited);
        assert_eq!(
            handler.confirm(Some(&sig), &body),
            Confirmation::AlreadyCredited
        );

        let account = vault.account(&account.id).unwrap().unwrap();
        assert_eq!(account.balance, dec!(260)); // 10 bonus + one 250 deposit
        let deposits = vault
            .transactions(
                &account.id,
                TransactionQuery::default().with_kind(TransactionKind::Deposit),
            )
            .unwrap();
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].balance_after, dec!(260));
    }

    #[test]
    fn missing_user_id_is_queued_not_dropped() {
        let (_dir, vault, handler) = handler();
        let body = serde_json::json!({
            "event": "charge.success",
            "data": { "amount": 7000, "reference": "orphan", "metadata": {} }
        })
        .to_string()
        .into_bytes();
        let sig = sign(SECRET, &body);

        let outcome = handler.confirm(Some(&sig), &body);
        assert_eq!(outcome, Confirmation::QueuedForReconciliation);
        assert!(outcome.is_success());

        let queued = vault.unmatched_deposits().unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].reference, "orphan");
        assert_eq!(queued[0].amount, dec!(70));
    }

    #[test]
    fn unknown_account_requests_redelivery() {
        let (_dir, _vault, handler) = handler();
        let body = charge_body("no-such-account", "r9", 5000);
        let sig = sign(SECRET, &body);
        let outcome = handler.confirm(Some(&sig), &body);
        assert!(matches!(outcome, Confirmation::Retry(_)));
        assert!(!outcome.is_success());
    }

    #[test]
    fn other_events_are_acknowledged_and_ignored() {
        let (_dir, vault, handler) = handler();
        let account = open_account(&vault);
        let body = serde_json::json!({
            "event": "transfer.success",
            "data": { "amount": 9900, "reference": "t1",
                      "metadata": { "user_id": account.id.as_str() } }
        })
        .to_string()
        .into_bytes();
        let sig = sign(SECRET, &body);
        assert_eq!(handler.confirm(Some(&sig), &body), Confirmation::Ignored);
        let account = vault.account(&account.id).unwrap().unwrap();
        assert_eq!(account.balance, dec!(10));
    }
}
