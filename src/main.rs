use std::fs::File;
use std::io;
use std::path::PathBuf;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use corebank::application::accounts::{AccountService, OpenAccountRequest};
use corebank::application::engine::LedgerEngine;
use corebank::domain::account::AccountType;
use corebank::domain::ports::{AccountStoreRef, TransactionLedgerRef};
use corebank::error::LedgerError;
use corebank::infrastructure::in_memory::{InMemoryAccountStore, InMemoryTransactionLedger};
use corebank::interfaces::csv::operation_reader::{OperationKind, OperationReader, OperationRecord};
use corebank::interfaces::csv::statement_writer::StatementWriter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Path to a persistent RocksDB database. Without it, state lives in
    /// memory for the run.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let (accounts, ledger) = build_stores(&cli)?;
    let engine = LedgerEngine::new(accounts.clone(), ledger);
    let service = AccountService::new(accounts.clone()).with_locks(engine.account_locks());

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    for record in reader.records() {
        match record {
            Ok(record) => {
                if let Err(e) = apply(&engine, &service, record).await {
                    eprintln!("error applying operation: {e}");
                }
            }
            Err(e) => eprintln!("error reading operation: {e}"),
        }
    }

    let accounts = accounts.list_all().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = StatementWriter::new(stdout.lock());
    writer.write_accounts(&accounts).into_diagnostic()?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // stderr, so logs never mix into the statement on stdout
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(feature = "storage-rocksdb")]
fn build_stores(cli: &Cli) -> Result<(AccountStoreRef, TransactionLedgerRef)> {
    use corebank::infrastructure::rocksdb::RocksDbStore;
    use std::sync::Arc;

    if let Some(db_path) = &cli.db_path {
        let store = RocksDbStore::open(db_path).into_diagnostic()?;
        return Ok((Arc::new(store.clone()), Arc::new(store)));
    }
    Ok(in_memory_stores())
}

#[cfg(not(feature = "storage-rocksdb"))]
fn build_stores(_cli: &Cli) -> Result<(AccountStoreRef, TransactionLedgerRef)> {
    Ok(in_memory_stores())
}

fn in_memory_stores() -> (AccountStoreRef, TransactionLedgerRef) {
    use std::sync::Arc;
    (
        Arc::new(InMemoryAccountStore::new()),
        Arc::new(InMemoryTransactionLedger::new()),
    )
}

async fn apply(
    engine: &LedgerEngine,
    service: &AccountService,
    record: OperationRecord,
) -> corebank::Result<()> {
    let note = record.note.as_deref().unwrap_or("");
    match record.op {
        OperationKind::Open => {
            let owner = required(record.account, "open needs an owner in `account`")?;
            let request = OpenAccountRequest {
                initial_deposit: record.amount,
                ..OpenAccountRequest::new(
                    owner,
                    record.account_type.unwrap_or(AccountType::Current),
                )
            };
            service.open(request).await?;
        }
        OperationKind::Deposit => {
            let account = required(record.account, "deposit needs `account`")?;
            let amount = required(record.amount, "deposit needs `amount`")?;
            engine.deposit(account, amount, note).await?;
        }
        OperationKind::Withdraw => {
            let account = required(record.account, "withdraw needs `account`")?;
            let amount = required(record.amount, "withdraw needs `amount`")?;
            engine.withdraw(account, amount, note).await?;
        }
        OperationKind::Transfer => {
            let source = required(record.account, "transfer needs `account`")?;
            let destination = required(record.counterparty, "transfer needs `counterparty`")?;
            let amount = required(record.amount, "transfer needs `amount`")?;
            engine.transfer(source, destination, amount, note).await?;
        }
        OperationKind::Reverse => {
            let tx = required(record.tx, "reverse needs `tx`")?;
            engine.reverse(tx).await?;
        }
        OperationKind::Cancel => {
            let tx = required(record.tx, "cancel needs `tx`")?;
            engine.cancel(tx).await?;
        }
    }
    Ok(())
}

fn required<T>(value: Option<T>, message: &str) -> corebank::Result<T> {
    value.ok_or_else(|| LedgerError::InvalidOperation(message.to_string()))
}
