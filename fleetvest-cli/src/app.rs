use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;

use fleetvest_config::AppConfig;
use fleetvest_core::{AccountId, VehicleId, WithdrawalId};
use fleetvest_gateway::{spawn_gateway, PaymentConfirmationHandler, ShutdownSignal};
use fleetvest_ledger::{
    NewVehicle, SignupRequest, SqliteVault, TransactionKind, TransactionQuery, Vault,
    VehicleUpdate, WithdrawalQuery,
};

#[derive(Parser)]
#[command(name = "fleetvest", version, about = "Fleetvest ledger operations")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the payment webhook gateway until interrupted.
    Serve,
    /// Account management.
    #[command(subcommand)]
    Account(AccountCommand),
    /// Vehicle catalog management.
    #[command(subcommand)]
    Vehicle(VehicleCommand),
    /// Credit a confirmed deposit by hand (support/reconciliation path).
    Deposit {
        #[arg(long)]
        account: String,
        #[arg(long)]
        amount: Decimal,
        /// Provider reference; repeated references are not re-applied.
        #[arg(long)]
        reference: String,
    },
    /// Commit principal from an account to a vehicle.
    Invest {
        #[arg(long)]
        account: String,
        #[arg(long)]
        vehicle: String,
        #[arg(long)]
        amount: Decimal,
    },
    /// Withdrawal approval workflow.
    #[command(subcommand)]
    Withdrawals(WithdrawalCommand),
    /// Print an account's transaction history.
    Transactions {
        #[arg(long)]
        account: String,
        #[arg(long)]
        kind: Option<TransactionKind>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Mature every due investment of an account.
    Mature {
        #[arg(long)]
        account: String,
    },
    /// List deposits awaiting manual reconciliation.
    Reconcile,
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Open an account (applies the signup bonus).
    Open {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        referral_code: Option<String>,
    },
    /// Show an account by id or email.
    Show {
        #[arg(long, conflicts_with = "email")]
        id: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// List every account.
    List,
}

#[derive(Subcommand)]
enum VehicleCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        total_value: Decimal,
        #[arg(long)]
        roi: Decimal,
    },
    List,
    /// Edit a listed vehicle; omitted fields stay unchanged.
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        total_value: Option<Decimal>,
        #[arg(long)]
        roi: Option<Decimal>,
    },
    Remove {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum WithdrawalCommand {
    /// List withdrawal requests (pending only unless --all).
    List {
        #[arg(long)]
        all: bool,
    },
    Approve {
        #[arg(long)]
        id: String,
    },
    Reject {
        #[arg(long)]
        id: String,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve => serve(cli.config.as_deref()).await,
        command => {
            let config = AppConfig::load(cli.config.as_deref())?;
            let vault =
                SqliteVault::with_policy(config.database.path.as_str(), config.policy.clone())?;
            execute(&vault, command)
        }
    }
}

async fn serve(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = AppConfig::load_for_gateway(config_path)?;
    let vault = Arc::new(SqliteVault::with_policy(
        config.database.path.as_str(),
        config.policy.clone(),
    )?);
    let handler = Arc::new(PaymentConfirmationHandler::new(
        vault,
        config.gateway.secret.clone(),
    ));

    let shutdown = ShutdownSignal::new();
    let server = spawn_gateway(
        config.gateway.listen_addr()?,
        config.gateway.webhook_path.clone(),
        handler,
        shutdown.clone(),
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    shutdown.trigger();
    server.await.context("gateway task panicked")?;
    Ok(())
}

fn execute(vault: &SqliteVault, command: Command) -> Result<()> {
    match command {
        Command::Serve => unreachable!("serve is handled before this point"),
        Command::Account(AccountCommand::Open {
            name,
            email,
            phone,
            password,
            referral_code,
        }) => {
            let account = vault.open_account(&SignupRequest {
                name,
                email,
                phone,
                password,
                referral_code,
            })?;
            println!("opened account {} (code {})", account.id, account.referral_code);
        }
        Command::Account(AccountCommand::Show { id, email }) => {
            let account = match (id, email) {
                (Some(id), _) => vault.account(&AccountId::from(id.as_str()))?,
                (None, Some(email)) => vault.account_by_email(&email)?,
                (None, None) => anyhow::bail!("pass --id or --email"),
            };
            match account {
                Some(account) => {
                    println!("{:<14} {}", "id", account.id);
                    println!("{:<14} {}", "name", account.name);
                    println!("{:<14} {}", "email", account.email);
                    println!("{:<14} {}", "balance", account.balance);
                    println!("{:<14} {}", "total earned", account.total_earned);
                    println!("{:<14} {}", "total invested", account.total_invested);
                    println!("{:<14} {}", "referral code", account.referral_code);
                }
                None => println!("no such account"),
            }
        }
        Command::Account(AccountCommand::List) => {
            for account in vault.accounts()? {
                println!(
                    "{}  {:<20} {:<28} balance {:>10}  earned {:>10}  invested {:>10}",
                    account.id,
                    account.name,
                    account.email,
                    account.balance,
                    account.total_earned,
                    account.total_invested
                );
            }
        }
        Command::Vehicle(VehicleCommand::Add {
            name,
            description,
            total_value,
            roi,
        }) => {
            let vehicle = vault.add_vehicle(&NewVehicle {
                name,
                description,
                total_value,
                roi,
            })?;
            println!("listed vehicle {} ({})", vehicle.name, vehicle.id);
        }
        Command::Vehicle(VehicleCommand::List) => {
            for vehicle in vault.vehicles()? {
                println!(
                    "{}  {:<28} {:>12}/{:<12} roi {:>5}%  {}",
                    vehicle.id,
                    vehicle.name,
                    vehicle.invested_amount,
                    vehicle.total_value,
                    vehicle.roi,
                    vehicle.status
                );
            }
        }
        Command::Vehicle(VehicleCommand::Update {
            id,
            name,
            description,
            total_value,
            roi,
        }) => {
            let vehicle = vault.update_vehicle(
                &VehicleId::from(id.as_str()),
                &VehicleUpdate {
                    name,
                    description,
                    total_value,
                    roi,
                },
            )?;
            println!(
                "updated vehicle {} ({}): {}/{} roi {}%",
                vehicle.name,
                vehicle.id,
                vehicle.invested_amount,
                vehicle.total_value,
                vehicle.roi
            );
        }
        Command::Vehicle(VehicleCommand::Remove { id }) => {
            vault.remove_vehicle(&VehicleId::from(id.as_str()))?;
            println!("removed vehicle {id}");
        }
        Command::Deposit {
            account,
            amount,
            reference,
        } => {
            let outcome =
                vault.apply_deposit(&AccountId::from(account.as_str()), amount, &reference)?;
            println!("deposit {reference}: {outcome:?}");
        }
        Command::Invest {
            account,
            vehicle,
            amount,
        } => {
            let investment = vault.apply_investment(
                &AccountId::from(account.as_str()),
                &VehicleId::from(vehicle.as_str()),
                amount,
            )?;
            println!(
                "invested {} in {} until {}",
                investment.amount,
                investment.vehicle_name,
                investment.end_date.date_naive()
            );
        }
        Command::Withdrawals(WithdrawalCommand::List { all }) => {
            let query = if all {
                WithdrawalQuery::default()
            } else {
                WithdrawalQuery::pending()
            };
            for listing in vault.withdrawals(query)? {
                let request = listing.request;
                println!(
                    "{}  {:<20} {:>10}  {:<9} {}  {}",
                    request.id,
                    listing.account_name,
                    request.amount,
                    request.status,
                    request.details,
                    request.created_at.date_naive()
                );
            }
        }
        Command::Withdrawals(WithdrawalCommand::Approve { id }) => {
            let request = vault.approve_withdrawal(&WithdrawalId::from(id.as_str()))?;
            println!("withdrawal {} is now {}", request.id, request.status);
        }
        Command::Withdrawals(WithdrawalCommand::Reject { id }) => {
            let request = vault.reject_withdrawal(&WithdrawalId::from(id.as_str()))?;
            println!("withdrawal {} is now {}", request.id, request.status);
        }
        Command::Transactions {
            account,
            kind,
            limit,
        } => {
            let mut query = TransactionQuery::default();
            if let Some(kind) = kind {
                query = query.with_kind(kind);
            }
            if let Some(limit) = limit {
                query = query.with_limit(limit);
            }
            for entry in vault.transactions(&AccountId::from(account.as_str()), query)? {
                println!(
                    "{}  {:<15} {:>10}  balance {:>10}  {}",
                    entry.created_at.date_naive(),
                    entry.kind,
                    entry.amount,
                    entry.balance_after,
                    entry.description
                );
            }
        }
        Command::Mature { account } => {
            let matured =
                vault.mature_investments(&AccountId::from(account.as_str()), Utc::now())?;
            if matured.is_empty() {
                println!("no investments due");
            }
            for investment in matured {
                println!(
                    "matured {} in {} (principal {} + profit {})",
                    investment.id,
                    investment.vehicle_name,
                    investment.amount,
                    investment.projected_profit()
                );
            }
        }
        Command::Reconcile => {
            for deposit in vault.unmatched_deposits()? {
                println!(
                    "{}  {:>10}  received {}  {}",
                    deposit.reference,
                    deposit.amount,
                    deposit.received_at.date_naive(),
                    deposit
                        .metadata
                        .map(|meta| meta.to_string())
                        .unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}
