use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use fleetvest_core::{
    AccountId, InvestmentId, Money, Policy, ReferralId, TransactionId, VehicleId, WithdrawalId,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use rust_decimal::Decimal;

use crate::plan::{self, ReferralContext, SignupRequest};
use crate::record::{
    Account, Investment, InvestmentStatus, Referral, ReferralStatus, TransactionKind,
    TransactionRecord, UnmatchedDeposit, Vehicle, VehicleStatus, WithdrawalRequest,
    WithdrawalStatus,
};
use crate::referral::generate_referral_code;
use crate::vault::{DepositOutcome, NewVehicle, Vault, VehicleUpdate, WithdrawalListing};
use crate::{LedgerError, LedgerResult, TransactionQuery, WithdrawalQuery};

const VAULT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    phone TEXT NOT NULL,
    balance TEXT NOT NULL,
    total_earned TEXT NOT NULL,
    total_invested TEXT NOT NULL,
    referral_code TEXT NOT NULL UNIQUE,
    referral_earnings TEXT NOT NULL,
    referred_by TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS vehicles (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    total_value TEXT NOT NULL,
    invested_amount TEXT NOT NULL,
    roi TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS investments (
    id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL,
    vehicle_id TEXT NOT NULL,
    vehicle_name TEXT NOT NULL,
    amount TEXT NOT NULL,
    roi TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    status TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS investments_idx_account_status
    ON investments(account_id, status);
CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    amount TEXT NOT NULL,
    balance_after TEXT NOT NULL,
    description TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS transactions_idx_account_created
    ON transactions(account_id, created_at);
CREATE TABLE IF NOT EXISTS referrals (
    id TEXT PRIMARY KEY,
    referrer_id TEXT NOT NULL,
    referred_id TEXT NOT NULL UNIQUE,
    referred_name TEXT NOT NULL,
    referred_email TEXT NOT NULL,
    commission_rate TEXT NOT NULL,
    earned TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS referrals_idx_referrer
    ON referrals(referrer_id);
CREATE TABLE IF NOT EXISTS withdrawals (
    id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL,
    amount TEXT NOT NULL,
    method TEXT NOT NULL,
    details TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    processed_at TEXT
);
CREATE INDEX IF NOT EXISTS withdrawals_idx_status
    ON withdrawals(status);
CREATE TABLE IF NOT EXISTS webhook_events (
    reference TEXT PRIMARY KEY,
    account_id TEXT NOT NULL,
    amount TEXT NOT NULL,
    received_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS unmatched_deposits (
    reference TEXT PRIMARY KEY,
    amount TEXT NOT NULL,
    metadata TEXT,
    received_at TEXT NOT NULL
);
"#;

/// SQLite-backed vault. Each logical operation runs inside one immediate
/// transaction: fresh reads, precondition checks, every write, one commit.
#[derive(Clone, Debug)]
pub struct SqliteVault {
    path: PathBuf,
    policy: Policy,
}

impl SqliteVault {
    pub fn new(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        Self::with_policy(path, Policy::default())
    }

    pub fn with_policy(path: impl Into<PathBuf>, policy: Policy) -> LedgerResult<Self> {
        let vault = Self {
            path: path.into(),
            policy,
        };
        vault.initialize_schema()?;
        Ok(vault)
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    fn initialize_schema(&self) -> LedgerResult<()> {
        let conn = self.connect()?;
        conn.execute_batch(VAULT_SCHEMA)?;
        Ok(())
    }

    fn connect(&self) -> LedgerResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Ok(conn)
    }
}

impl Vault for SqliteVault {
    fn open_account(&self, request: &SignupRequest) -> LedgerResult<Account> {
        let now = Utc::now();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let referrer = match request.referral_code.as_deref() {
            Some(code) => Some(load_account_by_referral_code(&tx, code)?.ok_or_else(|| {
                LedgerError::validation("the referral code you used is not valid")
            })?),
            None => None,
        };
        if load_account_by_email(&tx, request.email.trim())?.is_some() {
            return Err(LedgerError::validation(
                "an account with this email already exists",
            ));
        }

        let mut plan = plan::plan_signup(request, referrer.as_ref(), &self.policy, now)?;
        while load_account_by_referral_code(&tx, &plan.account.referral_code)?.is_some() {
            plan.account.referral_code = generate_referral_code();
        }

        insert_account(&tx, &plan.account)?;
        insert_transaction(&tx, &plan.bonus_entry)?;
        if let Some(referral) = &plan.referral {
            insert_referral(&tx, referral)?;
        }
        tx.commit()?;
        Ok(plan.account)
    }

    fn apply_deposit(
        &self,
        account: &AccountId,
        amount: Money,
        reference: &str,
    ) -> LedgerResult<DepositOutcome> {
        let now = Utc::now();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if webhook_event_exists(&tx, reference)? {
            return Ok(DepositOutcome::AlreadyApplied);
        }
        let current = load_account(&tx, account)?
            .ok_or_else(|| LedgerError::not_found("account", account.as_str()))?;
        let plan = plan::plan_deposit(&current, amount, reference, now)?;

        update_account(&tx, &plan.account)?;
        insert_transaction(&tx, &plan.entry)?;
        tx.execute(
            "INSERT INTO webhook_events (reference, account_id, amount, received_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                reference,
                account.as_str(),
                amount.to_string(),
                now.to_rfc3339()
            ],
        )?;
        tx.commit()?;
        Ok(DepositOutcome::Applied)
    }

    fn record_unmatched_deposit(
        &self,
        reference: &str,
        amount: Money,
        metadata: Option<&serde_json::Value>,
    ) -> LedgerResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR IGNORE INTO unmatched_deposits (reference, amount, metadata, received_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                reference,
                amount.to_string(),
                metadata.map(|value| value.to_string()),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn apply_investment(
        &self,
        account: &AccountId,
        vehicle: &VehicleId,
        amount: Money,
    ) -> LedgerResult<Investment> {
        let now = Utc::now();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let investor = load_account(&tx, account)?
            .ok_or_else(|| LedgerError::not_found("account", account.as_str()))?;
        let listed = load_vehicle(&tx, vehicle)?
            .ok_or_else(|| LedgerError::not_found("vehicle", vehicle.as_str()))?;

        // The referrer only matters on the first investment, so skip the
        // extra reads otherwise.
        let referrer_state = match (&investor.referred_by, investor.total_invested.is_zero()) {
            (Some(referrer_id), true) => {
                let referrer = load_account(&tx, referrer_id)?
                    .ok_or_else(|| LedgerError::not_found("account", referrer_id.as_str()))?;
                let referral = load_referral(&tx, referrer_id, account)?;
                Some((referrer, referral))
            }
            _ => None,
        };
        let ctx = referrer_state
            .as_ref()
            .map(|(referrer, referral)| ReferralContext {
                referrer,
                referral: referral.as_ref(),
            });

        let plan = plan::plan_investment(&investor, &listed, ctx, amount, &self.policy, now)?;

        update_account(&tx, &plan.account)?;
        update_vehicle_row(&tx, &plan.vehicle)?;
        insert_investment(&tx, &plan.investment)?;
        insert_transaction(&tx, &plan.entry)?;
        if let Some(payout) = &plan.payout {
            update_account(&tx, &payout.referrer)?;
            insert_transaction(&tx, &payout.entry)?;
            if let Some(referral) = &payout.referral {
                update_referral_earned(&tx, referral)?;
            }
        }
        tx.commit()?;
        Ok(plan.investment)
    }

    fn request_withdrawal(
        &self,
        account: &AccountId,
        amount: Money,
        details: &str,
    ) -> LedgerResult<WithdrawalRequest> {
        let now = Utc::now();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = load_account(&tx, account)?
            .ok_or_else(|| LedgerError::not_found("account", account.as_str()))?;
        let request = plan::plan_withdrawal_request(&current, amount, details, &self.policy, now)?;
        insert_withdrawal(&tx, &request)?;
        tx.commit()?;
        Ok(request)
    }

    fn approve_withdrawal(&self, request: &WithdrawalId) -> LedgerResult<WithdrawalRequest> {
        let now = Utc::now();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let pending = load_withdrawal(&tx, request)?
            .ok_or_else(|| LedgerError::not_found("withdrawal request", request.as_str()))?;
        let account = load_account(&tx, &pending.account_id)?
            .ok_or_else(|| LedgerError::not_found("account", pending.account_id.as_str()))?;
        let plan = plan::plan_withdrawal_approval(&account, &pending, now)?;

        update_account(&tx, &plan.account)?;
        update_withdrawal(&tx, &plan.request)?;
        insert_transaction(&tx, &plan.entry)?;
        tx.commit()?;
        Ok(plan.request)
    }

    fn reject_withdrawal(&self, request: &WithdrawalId) -> LedgerResult<WithdrawalRequest> {
        let now = Utc::now();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let pending = load_withdrawal(&tx, request)?
            .ok_or_else(|| LedgerError::not_found("withdrawal request", request.as_str()))?;
        let rejected = plan::plan_withdrawal_rejection(&pending, now)?;
        update_withdrawal(&tx, &rejected)?;
        tx.commit()?;
        Ok(rejected)
    }

    fn mature_investments(
        &self,
        account: &AccountId,
        now: DateTime<Utc>,
    ) -> LedgerResult<Vec<Investment>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut state = load_account(&tx, account)?
            .ok_or_else(|| LedgerError::not_found("account", account.as_str()))?;
        let due = load_due_investments(&tx, account, now)?;

        let mut matured = Vec::with_capacity(due.len());
        for investment in &due {
            let plan = plan::plan_maturity(&state, investment, now)?;
            state = plan.account;
            update_investment_status(&tx, &plan.investment)?;
            insert_transaction(&tx, &plan.entry)?;
            matured.push(plan.investment);
        }
        if !matured.is_empty() {
            update_account(&tx, &state)?;
        }
        tx.commit()?;
        Ok(matured)
    }

    fn add_vehicle(&self, vehicle: &NewVehicle) -> LedgerResult<Vehicle> {
        if vehicle.name.trim().is_empty() {
            return Err(LedgerError::validation("vehicle name is required"));
        }
        if vehicle.description.trim().is_empty() {
            return Err(LedgerError::validation("vehicle description is required"));
        }
        if vehicle.total_value <= Decimal::ZERO {
            return Err(LedgerError::validation(
                "total value must be greater than 0",
            ));
        }
        if vehicle.roi < Decimal::ZERO {
            return Err(LedgerError::validation("roi cannot be negative"));
        }

        let record = Vehicle {
            id: VehicleId::generate(),
            name: vehicle.name.trim().to_owned(),
            description: vehicle.description.trim().to_owned(),
            total_value: vehicle.total_value,
            invested_amount: Decimal::ZERO,
            roi: vehicle.roi,
            status: VehicleStatus::Available,
            created_at: Utc::now(),
        };
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO vehicles (
                id, name, description, total_value, invested_amount, roi, status, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id.as_str(),
                record.name,
                record.description,
                record.total_value.to_string(),
                record.invested_amount.to_string(),
                record.roi.to_string(),
                record.status.as_str(),
                record.created_at.to_rfc3339()
            ],
        )?;
        Ok(record)
    }

    fn update_vehicle(
        &self,
        vehicle: &VehicleId,
        changes: &VehicleUpdate,
    ) -> LedgerResult<Vehicle> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut listed = load_vehicle(&tx, vehicle)?
            .ok_or_else(|| LedgerError::not_found("vehicle", vehicle.as_str()))?;

        if let Some(name) = &changes.name {
            if name.trim().is_empty() {
                return Err(LedgerError::validation("vehicle name is required"));
            }
            listed.name = name.trim().to_owned();
        }
        if let Some(description) = &changes.description {
            if description.trim().is_empty() {
                return Err(LedgerError::validation("vehicle description is required"));
            }
            listed.description = description.trim().to_owned();
        }
        if let Some(total_value) = changes.total_value {
            if total_value <= Decimal::ZERO {
                return Err(LedgerError::validation(
                    "total value must be greater than 0",
                ));
            }
            if total_value < listed.invested_amount {
                return Err(LedgerError::precondition(format!(
                    "total value cannot drop below the {} already invested",
                    listed.invested_amount
                )));
            }
            listed.total_value = total_value;
        }
        if let Some(roi) = changes.roi {
            if roi < Decimal::ZERO {
                return Err(LedgerError::validation("roi cannot be negative"));
            }
            listed.roi = roi;
        }
        listed.status = if listed.invested_amount == listed.total_value {
            VehicleStatus::FullyInvested
        } else {
            VehicleStatus::Available
        };

        update_vehicle_row(&tx, &listed)?;
        tx.commit()?;
        Ok(listed)
    }

    fn remove_vehicle(&self, vehicle: &VehicleId) -> LedgerResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let listed = load_vehicle(&tx, vehicle)?
            .ok_or_else(|| LedgerError::not_found("vehicle", vehicle.as_str()))?;
        if !listed.invested_amount.is_zero() {
            return Err(LedgerError::precondition(
                "vehicle has active investments and cannot be removed",
            ));
        }
        tx.execute("DELETE FROM vehicles WHERE id = ?1", params![vehicle.as_str()])?;
        tx.commit()?;
        Ok(())
    }

    fn account(&self, id: &AccountId) -> LedgerResult<Option<Account>> {
        let conn = self.connect()?;
        load_account(&conn, id)
    }

    fn accounts(&self) -> LedgerResult<Vec<Account>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, email, phone, balance, total_earned, total_invested,
                    referral_code, referral_earnings, referred_by, created_at, updated_at
             FROM accounts ORDER BY created_at DESC, rowid DESC",
        )?;
        let mut rows = stmt.query([])?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next()? {
            accounts.push(row_to_account(row)?);
        }
        Ok(accounts)
    }

    fn account_by_email(&self, email: &str) -> LedgerResult<Option<Account>> {
        let conn = self.connect()?;
        load_account_by_email(&conn, email)
    }

    fn account_by_referral_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        let conn = self.connect()?;
        load_account_by_referral_code(&conn, code)
    }

    fn vehicle(&self, id: &VehicleId) -> LedgerResult<Option<Vehicle>> {
        let conn = self.connect()?;
        load_vehicle(&conn, id)
    }

    fn vehicles(&self) -> LedgerResult<Vec<Vehicle>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, total_value, invested_amount, roi, status, created_at
             FROM vehicles ORDER BY created_at DESC, rowid DESC",
        )?;
        let mut rows = stmt.query([])?;
        let mut vehicles = Vec::new();
        while let Some(row) = rows.next()? {
            vehicles.push(row_to_vehicle(row)?);
        }
        Ok(vehicles)
    }

    fn transactions(
        &self,
        account: &AccountId,
        query: TransactionQuery,
    ) -> LedgerResult<Vec<TransactionRecord>> {
        let conn = self.connect()?;
        let mut sql = String::from(
            "SELECT id, account_id, kind, amount, balance_after, description, created_at
             FROM transactions
             WHERE account_id = ?1
               AND (?2 IS NULL OR kind = ?2)
               AND (?3 IS NULL OR created_at >= ?3)
               AND (?4 IS NULL OR created_at <= ?4)",
        );
        sql.push_str(if query.oldest_first {
            " ORDER BY created_at ASC, rowid ASC"
        } else {
            " ORDER BY created_at DESC, rowid DESC"
        });
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?5");
        }

        let mut params: Vec<Value> = Vec::with_capacity(5);
        params.push(Value::from(account.as_str().to_owned()));
        params.push(optional_text(
            query.kind.map(|kind| kind.as_str().to_owned()),
        ));
        params.push(optional_text(query.start_time.map(|ts| ts.to_rfc3339())));
        params.push(optional_text(query.end_time.map(|ts| ts.to_rfc3339())));
        if let Some(limit) = query.limit {
            params.push(Value::Integer(limit as i64));
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(row_to_transaction(row)?);
        }
        Ok(entries)
    }

    fn investments(&self, account: &AccountId) -> LedgerResult<Vec<Investment>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, account_id, vehicle_id, vehicle_name, amount, roi, start_date, end_date, status
             FROM investments WHERE account_id = ?1
             ORDER BY start_date DESC, rowid DESC",
        )?;
        let mut rows = stmt.query(params![account.as_str()])?;
        let mut investments = Vec::new();
        while let Some(row) = rows.next()? {
            investments.push(row_to_investment(row)?);
        }
        Ok(investments)
    }

    fn referrals(&self, referrer: &AccountId) -> LedgerResult<Vec<Referral>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, referrer_id, referred_id, referred_name, referred_email,
                    commission_rate, earned, status, created_at
             FROM referrals WHERE referrer_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let mut rows = stmt.query(params![referrer.as_str()])?;
        let mut referrals = Vec::new();
        while let Some(row) = rows.next()? {
            referrals.push(row_to_referral(row)?);
        }
        Ok(referrals)
    }

    fn withdrawals(&self, query: WithdrawalQuery) -> LedgerResult<Vec<WithdrawalListing>> {
        let conn = self.connect()?;
        let mut sql = String::from(
            "SELECT w.id, w.account_id, w.amount, w.method, w.details, w.status,
                    w.created_at, w.processed_at, a.name
             FROM withdrawals w
             JOIN accounts a ON a.id = w.account_id
             WHERE (?1 IS NULL OR w.status = ?1)
             ORDER BY w.created_at DESC, w.rowid DESC",
        );
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?2");
        }
        let mut params: Vec<Value> = Vec::with_capacity(2);
        params.push(optional_text(
            query.status.map(|status| status.as_str().to_owned()),
        ));
        if let Some(limit) = query.limit {
            params.push(Value::Integer(limit as i64));
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut listings = Vec::new();
        while let Some(row) = rows.next()? {
            let request = row_to_withdrawal(row)?;
            let account_name: String = row.get(8)?;
            listings.push(WithdrawalListing {
                request,
                account_name,
            });
        }
        Ok(listings)
    }

    fn unmatched_deposits(&self) -> LedgerResult<Vec<UnmatchedDeposit>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT reference, amount, metadata, received_at
             FROM unmatched_deposits ORDER BY received_at ASC, rowid ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut deposits = Vec::new();
        while let Some(row) = rows.next()? {
            let reference: String = row.get(0)?;
            let amount: String = row.get(1)?;
            let metadata: Option<String> = row.get(2)?;
            let received_at: String = row.get(3)?;
            deposits.push(UnmatchedDeposit {
                reference,
                amount: parse_decimal(&amount)?,
                metadata: metadata
                    .map(|json| {
                        serde_json::from_str(&json).map_err(|err| {
                            LedgerError::Serialization(format!("invalid metadata payload: {err}"))
                        })
                    })
                    .transpose()?,
                received_at: parse_datetime(&received_at)?,
            });
        }
        Ok(deposits)
    }
}

fn webhook_event_exists(conn: &Connection, reference: &str) -> LedgerResult<bool> {
    let seen: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM webhook_events WHERE reference = ?1",
            params![reference],
            |row| row.get(0),
        )
        .optional()?;
    Ok(seen.is_some())
}

fn load_account(conn: &Connection, id: &AccountId) -> LedgerResult<Option<Account>> {
    load_account_where(conn, "id = ?1", id.as_str())
}

fn load_account_by_email(conn: &Connection, email: &str) -> LedgerResult<Option<Account>> {
    load_account_where(conn, "email = ?1", email)
}

fn load_account_by_referral_code(conn: &Connection, code: &str) -> LedgerResult<Option<Account>> {
    load_account_where(conn, "referral_code = ?1", code)
}

fn load_account_where(
    conn: &Connection,
    predicate: &str,
    key: &str,
) -> LedgerResult<Option<Account>> {
    let sql = format!(
        "SELECT id, name, email, phone, balance, total_earned, total_invested,
                referral_code, referral_earnings, referred_by, created_at, updated_at
         FROM accounts WHERE {predicate}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![key])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_account(row)?)),
        None => Ok(None),
    }
}

fn load_vehicle(conn: &Connection, id: &VehicleId) -> LedgerResult<Option<Vehicle>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, total_value, invested_amount, roi, status, created_at
         FROM vehicles WHERE id = ?1",
    )?;
    let mut rows = stmt.query(params![id.as_str()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_vehicle(row)?)),
        None => Ok(None),
    }
}

fn load_referral(
    conn: &Connection,
    referrer: &AccountId,
    referred: &AccountId,
) -> LedgerResult<Option<Referral>> {
    let mut stmt = conn.prepare(
        "SELECT id, referrer_id, referred_id, referred_name, referred_email,
                commission_rate, earned, status, created_at
         FROM referrals WHERE referrer_id = ?1 AND referred_id = ?2",
    )?;
    let mut rows = stmt.query(params![referrer.as_str(), referred.as_str()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_referral(row)?)),
        None => Ok(None),
    }
}

fn load_withdrawal(conn: &Connection, id: &WithdrawalId) -> LedgerResult<Option<WithdrawalRequest>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, amount, method, details, status, created_at, processed_at
         FROM withdrawals WHERE id = ?1",
    )?;
    let mut rows = stmt.query(params![id.as_str()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_withdrawal(row)?)),
        None => Ok(None),
    }
}

fn load_due_investments(
    conn: &Connection,
    account: &AccountId,
    now: DateTime<Utc>,
) -> LedgerResult<Vec<Investment>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, vehicle_id, vehicle_name, amount, roi, start_date, end_date, status
         FROM investments
         WHERE account_id = ?1 AND status = ?2 AND end_date <= ?3
         ORDER BY end_date ASC, rowid ASC",
    )?;
    let mut rows = stmt.query(params![
        account.as_str(),
        InvestmentStatus::Active.as_str(),
        now.to_rfc3339()
    ])?;
    let mut due = Vec::new();
    while let Some(row) = rows.next()? {
        due.push(row_to_investment(row)?);
    }
    Ok(due)
}

fn insert_account(conn: &Connection, account: &Account) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO accounts (
            id, name, email, phone, balance, total_earned, total_invested,
            referral_code, referral_earnings, referred_by, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            account.id.as_str(),
            account.name,
            account.email,
            account.phone,
            account.balance.to_string(),
            account.total_earned.to_string(),
            account.total_invested.to_string(),
            account.referral_code,
            account.referral_earnings.to_string(),
            account.referred_by.as_ref().map(|id| id.as_str().to_owned()),
            account.created_at.to_rfc3339(),
            account.updated_at.to_rfc3339()
        ],
    )?;
    Ok(())
}

fn update_account(conn: &Connection, account: &Account) -> LedgerResult<()> {
    let changed = conn.execute(
        "UPDATE accounts SET
            balance = ?2, total_earned = ?3, total_invested = ?4,
            referral_earnings = ?5, updated_at = ?6
         WHERE id = ?1",
        params![
            account.id.as_str(),
            account.balance.to_string(),
            account.total_earned.to_string(),
            account.total_invested.to_string(),
            account.referral_earnings.to_string(),
            account.updated_at.to_rfc3339()
        ],
    )?;
    if changed != 1 {
        return Err(LedgerError::not_found("account", account.id.as_str()));
    }
    Ok(())
}

fn update_vehicle_row(conn: &Connection, vehicle: &Vehicle) -> LedgerResult<()> {
    let changed = conn.execute(
        "UPDATE vehicles SET
            name = ?2, description = ?3, total_value = ?4,
            invested_amount = ?5, roi = ?6, status = ?7
         WHERE id = ?1",
        params![
            vehicle.id.as_str(),
            vehicle.name,
            vehicle.description,
            vehicle.total_value.to_string(),
            vehicle.invested_amount.to_string(),
            vehicle.roi.to_string(),
            vehicle.status.as_str()
        ],
    )?;
    if changed != 1 {
        return Err(LedgerError::not_found("vehicle", vehicle.id.as_str()));
    }
    Ok(())
}

fn insert_investment(conn: &Connection, investment: &Investment) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO investments (
            id, account_id, vehicle_id, vehicle_name, amount, roi, start_date, end_date, status
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            investment.id.as_str(),
            investment.account_id.as_str(),
            investment.vehicle_id.as_str(),
            investment.vehicle_name,
            investment.amount.to_string(),
            investment.roi.to_string(),
            investment.start_date.to_rfc3339(),
            investment.end_date.to_rfc3339(),
            investment.status.as_str()
        ],
    )?;
    Ok(())
}

fn update_investment_status(conn: &Connection, investment: &Investment) -> LedgerResult<()> {
    let changed = conn.execute(
        "UPDATE investments SET status = ?2 WHERE id = ?1",
        params![investment.id.as_str(), investment.status.as_str()],
    )?;
    if changed != 1 {
        return Err(LedgerError::not_found("investment", investment.id.as_str()));
    }
    Ok(())
}

fn insert_transaction(conn: &Connection, entry: &TransactionRecord) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO transactions (
            id, account_id, kind, amount, balance_after, description, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.id.as_str(),
            entry.account_id.as_str(),
            entry.kind.as_str(),
            entry.amount.to_string(),
            entry.balance_after.to_string(),
            entry.description,
            entry.created_at.to_rfc3339()
        ],
    )?;
    Ok(())
}

fn insert_referral(conn: &Connection, referral: &Referral) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO referrals (
            id, referrer_id, referred_id, referred_name, referred_email,
            commission_rate, earned, status, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            referral.id.as_str(),
            referral.referrer_id.as_str(),
            referral.referred_id.as_str(),
            referral.referred_name,
            referral.referred_email,
            referral.commission_rate.to_string(),
            referral.earned.to_string(),
            referral.status.as_str(),
            referral.created_at.to_rfc3339()
        ],
    )?;
    Ok(())
}

fn update_referral_earned(conn: &Connection, referral: &Referral) -> LedgerResult<()> {
    let changed = conn.execute(
        "UPDATE referrals SET earned = ?2 WHERE id = ?1",
        params![referral.id.as_str(), referral.earned.to_string()],
    )?;
    if changed != 1 {
        return Err(LedgerError::not_found("referral", referral.id.as_str()));
    }
    Ok(())
}

fn insert_withdrawal(conn: &Connection, request: &WithdrawalRequest) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO withdrawals (
            id, account_id, amount, method, details, status, created_at, processed_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            request.id.as_str(),
            request.account_id.as_str(),
            request.amount.to_string(),
            request.method,
            request.details,
            request.status.as_str(),
            request.created_at.to_rfc3339(),
            request.processed_at.map(|ts| ts.to_rfc3339())
        ],
    )?;
    Ok(())
}

fn update_withdrawal(conn: &Connection, request: &WithdrawalRequest) -> LedgerResult<()> {
    let changed = conn.execute(
        "UPDATE withdrawals SET status = ?2, processed_at = ?3 WHERE id = ?1",
        params![
            request.id.as_str(),
            request.status.as_str(),
            request.processed_at.map(|ts| ts.to_rfc3339())
        ],
    )?;
    if changed != 1 {
        return Err(LedgerError::not_found(
            "withdrawal request",
            request.id.as_str(),
        ));
    }
    Ok(())
}

fn optional_text(value: Option<String>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

fn parse_decimal(value: &str) -> LedgerResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|err| LedgerError::Serialization(format!("invalid decimal {value}: {err}")))
}

fn parse_datetime(value: &str) -> LedgerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map_err(|err| LedgerError::Serialization(format!("invalid timestamp {value}: {err}")))
        .map(|ts| ts.with_timezone(&Utc))
}

fn row_to_account(row: &rusqlite::Row<'_>) -> LedgerResult<Account> {
    let id: String = row.get(0)?;
    let balance: String = row.get(4)?;
    let total_earned: String = row.get(5)?;
    let total_invested: String = row.get(6)?;
    let referral_earnings: String = row.get(8)?;
    let referred_by: Option<String> = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(Account {
        id: AccountId::from(id),
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        balance: parse_decimal(&balance)?,
        total_earned: parse_decimal(&total_earned)?,
        total_invested: parse_decimal(&total_invested)?,
        referral_code: row.get(7)?,
        referral_earnings: parse_decimal(&referral_earnings)?,
        referred_by: referred_by.map(AccountId::from),
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

fn row_to_vehicle(row: &rusqlite::Row<'_>) -> LedgerResult<Vehicle> {
    let id: String = row.get(0)?;
    let total_value: String = row.get(3)?;
    let invested_amount: String = row.get(4)?;
    let roi: String = row.get(5)?;
    let status: String = row.get(6)?;
    let created_at: String = row.get(7)?;

    Ok(Vehicle {
        id: VehicleId::from(id),
        name: row.get(1)?,
        description: row.get(2)?,
        total_value: parse_decimal(&total_value)?,
        invested_amount: parse_decimal(&invested_amount)?,
        roi: parse_decimal(&roi)?,
        status: VehicleStatus::from_str(&status).map_err(LedgerError::Serialization)?,
        created_at: parse_datetime(&created_at)?,
    })
}

fn row_to_investment(row: &rusqlite::Row<'_>) -> LedgerResult<Investment> {
    let id: String = row.get(0)?;
    let account_id: String = row.get(1)?;
    let vehicle_id: String = row.get(2)?;
    let amount: String = row.get(4)?;
    let roi: String = row.get(5)?;
    let start_date: String = row.get(6)?;
    let end_date: String = row.get(7)?;
    let status: String = row.get(8)?;

    Ok(Investment {
        id: InvestmentId::from(id),
        account_id: AccountId::from(account_id),
        vehicle_id: VehicleId::from(vehicle_id),
        vehicle_name: row.get(3)?,
        amount: parse_decimal(&amount)?,
        roi: parse_decimal(&roi)?,
        start_date: parse_datetime(&start_date)?,
        end_date: parse_datetime(&end_date)?,
        status: InvestmentStatus::from_str(&status).map_err(LedgerError::Serialization)?,
    })
}

fn row_to_transaction(row: &rusqlite::Row<'_>) -> LedgerResult<TransactionRecord> {
    let id: String = row.get(0)?;
    let account_id: String = row.get(1)?;
    let kind: String = row.get(2)?;
    let amount: String = row.get(3)?;
    let balance_after: String = row.get(4)?;
    let created_at: String = row.get(6)?;

    Ok(TransactionRecord {
        id: TransactionId::from(id),
        account_id: AccountId::from(account_id),
        kind: TransactionKind::from_str(&kind).map_err(LedgerError::Serialization)?,
        amount: parse_decimal(&amount)?,
        balance_after: parse_decimal(&balance_after)?,
        description: row.get(5)?,
        created_at: parse_datetime(&created_at)?,
    })
}

fn row_to_referral(row: &rusqlite::Row<'_>) -> LedgerResult<Referral> {
    let id: String = row.get(0)?;
    let referrer_id: String = row.get(1)?;
    let referred_id: String = row.get(2)?;
    let commission_rate: String = row.get(5)?;
    let earned: String = row.get(6)?;
    let status: String = row.get(7)?;
    let created_at: String = row.get(8)?;

    Ok(Referral {
        id: ReferralId::from(id),
        referrer_id: AccountId::from(referrer_id),
        referred_id: AccountId::from(referred_id),
        referred_name: row.get(3)?,
        referred_email: row.get(4)?,
        commission_rate: parse_decimal(&commission_rate)?,
        earned: parse_decimal(&earned)?,
        status: ReferralStatus::from_str(&status).map_err(LedgerError::Serialization)?,
        created_at: parse_datetime(&created_at)?,
    })
}

fn row_to_withdrawal(row: &rusqlite::Row<'_>) -> LedgerResult<WithdrawalRequest> {
    let id: String = row.get(0)?;
    let account_id: String = row.get(1)?;
    let amount: String = row.get(2)?;
    let status: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    let processed_at: Option<String> = row.get(7)?;

    Ok(WithdrawalRequest {
        id: WithdrawalId::from(id),
        account_id: AccountId::from(account_id),
        amount: parse_decimal(&amount)?,
        method: row.get(3)?,
        details: row.get(4)?,
        status: WithdrawalStatus::from_str(&status).map_err(LedgerError::Serialization)?,
        created_at: parse_datetime(&created_at)?,
        processed_at: processed_at.as_deref().map(parse_datetime).transpose()?,
    })
}
