use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use crate::application::locks::AccountLocks;
use crate::domain::account::{
    Account, AccountId, AccountStatus, AccountType, BranchId, NewAccount, OwnerId,
};
use crate::domain::account_number::AccountNumberGenerator;
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::AccountStoreRef;
use crate::error::{LedgerError, Result};

/// Collision retries before a saturated number space is treated as a fault.
const MAX_NUMBER_ATTEMPTS: u32 = 16;

#[derive(Debug, Clone)]
pub struct OpenAccountRequest {
    pub owner_id: OwnerId,
    pub account_type: AccountType,
    pub initial_deposit: Option<Decimal>,
    pub minimum_balance: Option<Decimal>,
    pub overdraft_limit: Option<Decimal>,
    pub interest_rate: Option<Decimal>,
    pub branch_id: Option<BranchId>,
}

impl OpenAccountRequest {
    pub fn new(owner_id: OwnerId, account_type: AccountType) -> Self {
        Self {
            owner_id,
            account_type,
            initial_deposit: None,
            minimum_balance: None,
            overdraft_limit: None,
            interest_rate: None,
            branch_id: None,
        }
    }
}

/// Account lifecycle: opening, status transitions, lookups.
///
/// Balance changes never go through here; the money movement engine owns
/// those.
pub struct AccountService {
    accounts: AccountStoreRef,
    numbers: AccountNumberGenerator,
    locks: Arc<AccountLocks>,
}

impl AccountService {
    pub fn new(accounts: AccountStoreRef) -> Self {
        Self {
            accounts,
            numbers: AccountNumberGenerator::new(),
            locks: Arc::new(AccountLocks::default()),
        }
    }

    /// Shares a lock registry — normally the engine's, so status flips
    /// serialize with in-flight money movement on the same account.
    pub fn with_locks(mut self, locks: Arc<AccountLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Opens an ACTIVE account with a freshly minted account number,
    /// regenerating on number collision. The minimum balance defaults by
    /// account type when the request leaves it unset.
    pub async fn open(&self, request: OpenAccountRequest) -> Result<Account> {
        let balance = match request.initial_deposit {
            None => Balance::ZERO,
            Some(value) if value == Decimal::ZERO => Balance::ZERO,
            Some(value) => Balance::from(Amount::new(value)?),
        };
        let minimum = request
            .minimum_balance
            .unwrap_or_else(|| request.account_type.default_minimum_balance());

        let mut attempts = 0u32;
        loop {
            let new_account = NewAccount {
                account_number: self.numbers.generate(request.account_type),
                account_type: request.account_type,
                owner_id: request.owner_id,
                branch_id: request.branch_id,
                balance,
                minimum_balance: Some(Balance::new(minimum)),
                overdraft_limit: request.overdraft_limit.map(Balance::new),
                interest_rate: request.interest_rate,
                status: AccountStatus::Active,
            };
            match self.accounts.insert(new_account).await {
                Ok(account) => {
                    info!(
                        account = account.id,
                        owner = account.owner_id,
                        number = %account.account_number,
                        "account opened"
                    );
                    return Ok(account);
                }
                Err(LedgerError::DuplicateAccountNumber(_)) if attempts + 1 < MAX_NUMBER_ATTEMPTS => {
                    attempts += 1;
                }
                Err(LedgerError::DuplicateAccountNumber(_)) => {
                    return Err(LedgerError::storage("account number space exhausted"));
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn set_status(&self, id: AccountId, status: AccountStatus) -> Result<Account> {
        let _guard = self.locks.acquire(id).await?;
        let account = self.accounts.set_status(id, status).await?;
        info!(account = id, status = ?status, "account status updated");
        Ok(account)
    }

    /// Closing is a status transition; the record and its history stay.
    pub async fn close(&self, id: AccountId) -> Result<Account> {
        self.set_status(id, AccountStatus::Closed).await
    }

    pub async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        self.accounts.get(id).await
    }

    pub async fn account_by_number(&self, number: &str) -> Result<Option<Account>> {
        self.accounts.get_by_number(number).await
    }

    pub async fn accounts_for_owner(&self, owner: OwnerId) -> Result<Vec<Account>> {
        self.accounts.list_by_owner(owner).await
    }

    pub async fn accounts_for_owner_with_status(
        &self,
        owner: OwnerId,
        status: AccountStatus,
    ) -> Result<Vec<Account>> {
        self.accounts.list_by_owner_and_status(owner, status).await
    }

    pub async fn accounts_below_minimum(&self) -> Result<Vec<Account>> {
        self.accounts.list_below_minimum().await
    }
}
