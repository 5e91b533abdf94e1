use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{Engine, Money};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "ledger_admin")]
#[command(about = "Admin utilities for the ledger (fund and inspect accounts)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./ledger.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Account(Account),
}

#[derive(Args, Debug)]
struct Account {
    #[command(subcommand)]
    command: AccountCommand,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    /// Create an account with an opening balance.
    Open(AccountOpenArgs),
    Balance(AccountArgs),
    /// List every transfer sent or received by the account, oldest first.
    History(AccountArgs),
}

#[derive(Args, Debug)]
struct AccountOpenArgs {
    #[arg(long)]
    account: String,
    /// Opening balance in major units, e.g. `10.50`.
    #[arg(long, default_value = "0", value_parser = parse_amount)]
    amount: Money,
}

#[derive(Args, Debug)]
struct AccountArgs {
    #[arg(long)]
    account: String,
}

fn parse_amount(raw: &str) -> Result<Money, String> {
    raw.parse().map_err(|err: engine::EngineError| err.to_string())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    let Command::Account(Account { command }) = cli.command;
    match command {
        AccountCommand::Open(args) => {
            let balance = engine.open_account(&args.account, args.amount).await?;
            println!("opened account: {} ({})", balance.account_id, balance.amount);
        }
        AccountCommand::Balance(args) => {
            let balance = engine.balance(&args.account).await?;
            match balance.last_transaction_id {
                Some(id) => println!("{}: {} (last transaction {id})", balance.account_id, balance.amount),
                None => println!("{}: {}", balance.account_id, balance.amount),
            }
        }
        AccountCommand::History(args) => {
            let history = engine.history(&args.account).await?;
            if history.is_empty() {
                println!("no transactions for {}", args.account);
            }
            for tx in history {
                println!(
                    "{}  {}  {} -> {}  {} {}  {}",
                    tx.created_at.to_rfc3339(),
                    tx.transaction_id,
                    tx.sender_id,
                    tx.recipient_id,
                    tx.amount,
                    tx.currency.as_deref().unwrap_or("-"),
                    tx.message.as_deref().unwrap_or(""),
                );
            }
        }
    }

    Ok(())
}
