use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::account::{Account, AccountId, AccountStatus, NewAccount, OwnerId};
use crate::domain::ports::{AccountStore, TransactionLedger};
use crate::domain::transaction::{
    NewTransaction, Transaction, TransactionId, TransactionStatus,
};
use crate::error::{LedgerError, Result};

#[derive(Default)]
struct AccountsInner {
    by_id: HashMap<AccountId, Account>,
    by_number: HashMap<String, AccountId>,
    next_id: AccountId,
}

/// Reference `AccountStore` adapter: `Arc<RwLock<..>>` maps with a unique
/// secondary index on account number. Ids are dense and start at 1.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    inner: Arc<RwLock<AccountsInner>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: NewAccount) -> Result<Account> {
        let mut inner = self.inner.write().await;
        if inner.by_number.contains_key(&account.account_number) {
            return Err(LedgerError::DuplicateAccountNumber(account.account_number));
        }
        inner.next_id += 1;
        let id = inner.next_id;
        let account = account.into_account(id, Utc::now());
        inner
            .by_number
            .insert(account.account_number.clone(), id);
        inner.by_id.insert(id, account.clone());
        Ok(account)
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let inner = self.inner.read().await;
        Ok(inner.by_id.get(&id).cloned())
    }

    async fn get_by_number(&self, number: &str) -> Result<Option<Account>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_number
            .get(number)
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<Account>> {
        let inner = self.inner.read().await;
        let mut accounts: Vec<_> = inner.by_id.values().cloned().collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn list_by_owner(&self, owner: OwnerId) -> Result<Vec<Account>> {
        let inner = self.inner.read().await;
        let mut accounts: Vec<_> = inner
            .by_id
            .values()
            .filter(|a| a.owner_id == owner)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn list_by_owner_and_status(
        &self,
        owner: OwnerId,
        status: AccountStatus,
    ) -> Result<Vec<Account>> {
        let inner = self.inner.read().await;
        let mut accounts: Vec<_> = inner
            .by_id
            .values()
            .filter(|a| a.owner_id == owner && a.status == status)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn list_below_minimum(&self) -> Result<Vec<Account>> {
        let inner = self.inner.read().await;
        let mut accounts: Vec<_> = inner
            .by_id
            .values()
            .filter(|a| {
                let minimum = a
                    .minimum_balance
                    .map(|b| b.value())
                    .unwrap_or(Decimal::ZERO);
                a.balance.value() < minimum
            })
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn set_status(&self, id: AccountId, status: AccountStatus) -> Result<Account> {
        let mut inner = self.inner.write().await;
        let account = inner
            .by_id
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        if !account.status.can_transition_to(status) {
            return Err(LedgerError::InvalidStatusTransition {
                from: account.status,
                to: status,
            });
        }
        account.status = status;
        account.updated_at = Some(Utc::now());
        Ok(account.clone())
    }

    async fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Account> {
        let mut inner = self.inner.write().await;
        let account = inner
            .by_id
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        account.balance = account.checked_balance_after(delta)?;
        account.updated_at = Some(Utc::now());
        Ok(account.clone())
    }
}

#[derive(Default)]
struct LedgerInner {
    by_id: HashMap<TransactionId, Transaction>,
    by_reference: HashMap<String, TransactionId>,
    next_id: TransactionId,
}

/// Reference `TransactionLedger` adapter, with a unique secondary index on
/// the transaction reference.
#[derive(Default, Clone)]
pub struct InMemoryTransactionLedger {
    inner: Arc<RwLock<LedgerInner>>,
}

impl InMemoryTransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut rows: Vec<Transaction>) -> Vec<Transaction> {
    rows.sort_by_key(|t| t.id);
    rows
}

#[async_trait]
impl TransactionLedger for InMemoryTransactionLedger {
    async fn append(&self, row: NewTransaction) -> Result<Transaction> {
        let mut inner = self.inner.write().await;
        if inner.by_reference.contains_key(&row.reference) {
            return Err(LedgerError::DuplicateReference(row.reference));
        }
        inner.next_id += 1;
        let id = inner.next_id;
        let row = row.into_transaction(id, Utc::now());
        inner.by_reference.insert(row.reference.clone(), id);
        inner.by_id.insert(id, row.clone());
        Ok(row)
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let inner = self.inner.read().await;
        Ok(inner.by_id.get(&id).cloned())
    }

    async fn get_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_reference
            .get(reference)
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn list_by_account(&self, account: AccountId) -> Result<Vec<Transaction>> {
        let inner = self.inner.read().await;
        Ok(sorted(
            inner
                .by_id
                .values()
                .filter(|t| t.touches(account))
                .cloned()
                .collect(),
        ))
    }

    async fn list_by_owner(&self, owner: OwnerId) -> Result<Vec<Transaction>> {
        let inner = self.inner.read().await;
        Ok(sorted(
            inner
                .by_id
                .values()
                .filter(|t| t.owner_id == owner)
                .cloned()
                .collect(),
        ))
    }

    async fn list_by_owner_and_status(
        &self,
        owner: OwnerId,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>> {
        let inner = self.inner.read().await;
        Ok(sorted(
            inner
                .by_id
                .values()
                .filter(|t| t.owner_id == owner && t.status == status)
                .cloned()
                .collect(),
        ))
    }

    async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let inner = self.inner.read().await;
        Ok(sorted(
            inner
                .by_id
                .values()
                .filter(|t| t.transaction_date >= from && t.transaction_date <= to)
                .cloned()
                .collect(),
        ))
    }

    async fn set_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction> {
        let mut inner = self.inner.write().await;
        let row = inner
            .by_id
            .get_mut(&id)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        if !row.status.can_transition_to(status) {
            return Err(LedgerError::TransactionNotReversible(id));
        }
        row.status = status;
        row.updated_at = Some(Utc::now());
        Ok(row.clone())
    }
}
