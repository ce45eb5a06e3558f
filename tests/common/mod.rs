#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;

use corebank::application::accounts::{AccountService, OpenAccountRequest};
use corebank::application::engine::LedgerEngine;
use corebank::domain::account::{AccountId, AccountType, OwnerId};
use corebank::domain::ports::{AccountStoreRef, TransactionLedgerRef};
use corebank::infrastructure::in_memory::{InMemoryAccountStore, InMemoryTransactionLedger};

pub struct Harness {
    pub engine: Arc<LedgerEngine>,
    pub service: AccountService,
    pub accounts: AccountStoreRef,
    pub ledger: TransactionLedgerRef,
}

pub fn harness() -> Harness {
    let accounts: AccountStoreRef = Arc::new(InMemoryAccountStore::new());
    let ledger: TransactionLedgerRef = Arc::new(InMemoryTransactionLedger::new());
    let engine = Arc::new(LedgerEngine::new(accounts.clone(), ledger.clone()));
    let service = AccountService::new(accounts.clone()).with_locks(engine.account_locks());
    Harness {
        engine,
        service,
        accounts,
        ledger,
    }
}

/// Opens an ACTIVE current account with an explicit zero minimum.
pub async fn open_funded(harness: &Harness, owner: OwnerId, balance: Decimal) -> AccountId {
    open_with_limits(harness, owner, balance, Some(Decimal::ZERO), None).await
}

pub async fn open_with_limits(
    harness: &Harness,
    owner: OwnerId,
    balance: Decimal,
    minimum_balance: Option<Decimal>,
    overdraft_limit: Option<Decimal>,
) -> AccountId {
    let request = OpenAccountRequest {
        initial_deposit: (balance > Decimal::ZERO).then_some(balance),
        minimum_balance,
        overdraft_limit,
        ..OpenAccountRequest::new(owner, AccountType::Current)
    };
    harness.service.open(request).await.unwrap().id
}

pub async fn balance_of(harness: &Harness, id: AccountId) -> Decimal {
    harness
        .accounts
        .get(id)
        .await
        .unwrap()
        .unwrap()
        .balance
        .value()
}
