use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::account::{Account, AccountId, AccountStatus, NewAccount, OwnerId};
use crate::domain::transaction::{NewTransaction, Transaction, TransactionId, TransactionStatus};
use crate::error::Result;

/// Storage port for account records.
///
/// Adapters own key allocation and the unique secondary key on
/// `account_number`. `adjust_balance` is the only balance mutator and must
/// validate through [`Account::checked_balance_after`], so the balance
/// invariant holds no matter which adapter is plugged in.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with `DuplicateAccountNumber` when the number is taken; callers
    /// regenerate and retry.
    async fn insert(&self, account: NewAccount) -> Result<Account>;

    async fn get(&self, id: AccountId) -> Result<Option<Account>>;

    async fn get_by_number(&self, number: &str) -> Result<Option<Account>>;

    async fn list_all(&self) -> Result<Vec<Account>>;

    async fn list_by_owner(&self, owner: OwnerId) -> Result<Vec<Account>>;

    async fn list_by_owner_and_status(
        &self,
        owner: OwnerId,
        status: AccountStatus,
    ) -> Result<Vec<Account>>;

    /// Accounts whose balance has fallen under their minimum (overdraft use).
    async fn list_below_minimum(&self) -> Result<Vec<Account>>;

    /// Validates against the account status transition table and fails with
    /// `InvalidStatusTransition` on an illegal edge.
    async fn set_status(&self, id: AccountId, status: AccountStatus) -> Result<Account>;

    /// Applies a signed delta to the balance. Fails with `AccountNotActive`
    /// or `InsufficientFunds`, leaving the record untouched.
    async fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Account>;
}

/// Append-only storage port for transaction rows.
#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// Fails with `DuplicateReference` when the reference is taken; callers
    /// regenerate and retry.
    async fn append(&self, row: NewTransaction) -> Result<Transaction>;

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>>;

    async fn get_by_reference(&self, reference: &str) -> Result<Option<Transaction>>;

    /// Rows whose source or destination is the given account, in id order.
    async fn list_by_account(&self, account: AccountId) -> Result<Vec<Transaction>>;

    async fn list_by_owner(&self, owner: OwnerId) -> Result<Vec<Transaction>>;

    async fn list_by_owner_and_status(
        &self,
        owner: OwnerId,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>>;

    async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>>;

    /// Validates against the transaction status machine and fails with
    /// `TransactionNotReversible` when the row is already terminal.
    async fn set_status(&self, id: TransactionId, status: TransactionStatus)
    -> Result<Transaction>;
}

pub type AccountStoreRef = Arc<dyn AccountStore>;
pub type TransactionLedgerRef = Arc<dyn TransactionLedger>;
