use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::domain::account::{Account, AccountId, AccountStatus, NewAccount, OwnerId};
use crate::domain::ports::{AccountStore, TransactionLedger};
use crate::domain::transaction::{
    NewTransaction, Transaction, TransactionId, TransactionStatus,
};
use crate::error::{LedgerError, Result};

pub const CF_ACCOUNTS: &str = "accounts";
pub const CF_ACCOUNTS_BY_NUMBER: &str = "accounts_by_number";
pub const CF_TRANSACTIONS: &str = "transactions";
pub const CF_TRANSACTIONS_BY_REFERENCE: &str = "transactions_by_reference";
pub const CF_META: &str = "meta";

const META_ACCOUNT_SEQ: &str = "accounts/next_id";
const META_TRANSACTION_SEQ: &str = "transactions/next_id";

/// Persistent adapter implementing both storage ports on one RocksDB
/// instance.
///
/// Primary rows live under big-endian id keys; the unique secondary keys
/// (account number, transaction reference) map to ids in their own column
/// families so uniqueness is a single point lookup. Values are serde_json,
/// so on-disk rows stay greppable.
///
/// Inserts serialize through an internal mutex (id allocation plus the
/// check-then-put on the secondary key). Read-modify-write on a single
/// account relies on the engine's per-account locks, which already admit one
/// writer per account.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    alloc: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates the database, ensuring all column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [
            CF_ACCOUNTS,
            CF_ACCOUNTS_BY_NUMBER,
            CF_TRANSACTIONS,
            CF_TRANSACTIONS_BY_REFERENCE,
            CF_META,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)
            .map_err(|e| LedgerError::storage(e.to_string()))?;
        Ok(Self {
            db: Arc::new(db),
            alloc: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::storage(format!("missing column family {name}")))
    }

    fn get_raw(&self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db
            .get_cf(self.cf(cf)?, key)
            .map_err(|e| LedgerError::storage(e.to_string()))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.get_raw(cf, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        self.db
            .put_cf(self.cf(cf)?, key, encode(value)?)
            .map_err(|e| LedgerError::storage(e.to_string()))
    }

    /// Allocates the next id under `seq_key`. Callers hold `alloc`.
    fn next_id(&self, seq_key: &str) -> Result<u64> {
        let current = self
            .get_raw(CF_META, seq_key.as_bytes())?
            .map(|bytes| decode_u64(&bytes))
            .transpose()?
            .unwrap_or(0);
        let next = current + 1;
        self.db
            .put_cf(self.cf(CF_META)?, seq_key.as_bytes(), next.to_be_bytes())
            .map_err(|e| LedgerError::storage(e.to_string()))?;
        Ok(next)
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item.map_err(|e| LedgerError::storage(e.to_string()))?;
            rows.push(decode(&value)?);
        }
        Ok(rows)
    }

    fn load_account(&self, id: AccountId) -> Result<Account> {
        self.get_json(CF_ACCOUNTS, &id.to_be_bytes())?
            .ok_or(LedgerError::AccountNotFound(id))
    }

    fn load_transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.get_json(CF_TRANSACTIONS, &id.to_be_bytes())?
            .ok_or(LedgerError::TransactionNotFound(id))
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| LedgerError::storage(format!("serialize: {e}")))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| LedgerError::storage(format!("deserialize: {e}")))
}

fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| LedgerError::storage("malformed sequence value"))?;
    Ok(u64::from_be_bytes(array))
}

#[async_trait]
impl AccountStore for RocksDbStore {
    async fn insert(&self, account: NewAccount) -> Result<Account> {
        let _alloc = self.alloc.lock().await;
        if self
            .get_raw(CF_ACCOUNTS_BY_NUMBER, account.account_number.as_bytes())?
            .is_some()
        {
            return Err(LedgerError::DuplicateAccountNumber(account.account_number));
        }
        let id = self.next_id(META_ACCOUNT_SEQ)?;
        let account = account.into_account(id, Utc::now());

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_ACCOUNTS)?, id.to_be_bytes(), encode(&account)?);
        batch.put_cf(
            self.cf(CF_ACCOUNTS_BY_NUMBER)?,
            account.account_number.as_bytes(),
            id.to_be_bytes(),
        );
        self.db
            .write(batch)
            .map_err(|e| LedgerError::storage(e.to_string()))?;
        Ok(account)
    }

    async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        self.get_json(CF_ACCOUNTS, &id.to_be_bytes())
    }

    async fn get_by_number(&self, number: &str) -> Result<Option<Account>> {
        match self.get_raw(CF_ACCOUNTS_BY_NUMBER, number.as_bytes())? {
            Some(bytes) => self.get_json(CF_ACCOUNTS, &bytes),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self.scan(CF_ACCOUNTS)?;
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn list_by_owner(&self, owner: OwnerId) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self.scan(CF_ACCOUNTS)?;
        accounts.retain(|a| a.owner_id == owner);
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn list_by_owner_and_status(
        &self,
        owner: OwnerId,
        status: AccountStatus,
    ) -> Result<Vec<Account>> {
        let mut accounts = self.list_by_owner(owner).await?;
        accounts.retain(|a| a.status == status);
        Ok(accounts)
    }

    async fn list_below_minimum(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self.scan(CF_ACCOUNTS)?;
        accounts.retain(|a| {
            let minimum = a
                .minimum_balance
                .map(|b| b.value())
                .unwrap_or(Decimal::ZERO);
            a.balance.value() < minimum
        });
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn set_status(&self, id: AccountId, status: AccountStatus) -> Result<Account> {
        let mut account = self.load_account(id)?;
        if !account.status.can_transition_to(status) {
            return Err(LedgerError::InvalidStatusTransition {
                from: account.status,
                to: status,
            });
        }
        account.status = status;
        account.updated_at = Some(Utc::now());
        self.put_json(CF_ACCOUNTS, &id.to_be_bytes(), &account)?;
        Ok(account)
    }

    async fn adjust_balance(&self, id: AccountId, delta: Decimal) -> Result<Account> {
        let mut account = self.load_account(id)?;
        account.balance = account.checked_balance_after(delta)?;
        account.updated_at = Some(Utc::now());
        self.put_json(CF_ACCOUNTS, &id.to_be_bytes(), &account)?;
        Ok(account)
    }
}

#[async_trait]
impl TransactionLedger for RocksDbStore {
    async fn append(&self, row: NewTransaction) -> Result<Transaction> {
        let _alloc = self.alloc.lock().await;
        if self
            .get_raw(CF_TRANSACTIONS_BY_REFERENCE, row.reference.as_bytes())?
            .is_some()
        {
            return Err(LedgerError::DuplicateReference(row.reference));
        }
        let id = self.next_id(META_TRANSACTION_SEQ)?;
        let row = row.into_transaction(id, Utc::now());

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_TRANSACTIONS)?, id.to_be_bytes(), encode(&row)?);
        batch.put_cf(
            self.cf(CF_TRANSACTIONS_BY_REFERENCE)?,
            row.reference.as_bytes(),
            id.to_be_bytes(),
        );
        self.db
            .write(batch)
            .map_err(|e| LedgerError::storage(e.to_string()))?;
        Ok(row)
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.get_json(CF_TRANSACTIONS, &id.to_be_bytes())
    }

    async fn get_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        match self.get_raw(CF_TRANSACTIONS_BY_REFERENCE, reference.as_bytes())? {
            Some(bytes) => self.get_json(CF_TRANSACTIONS, &bytes),
            None => Ok(None),
        }
    }

    async fn list_by_account(&self, account: AccountId) -> Result<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self.scan(CF_TRANSACTIONS)?;
        rows.retain(|t| t.touches(account));
        rows.sort_by_key(|t| t.id);
        Ok(rows)
    }

    async fn list_by_owner(&self, owner: OwnerId) -> Result<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self.scan(CF_TRANSACTIONS)?;
        rows.retain(|t| t.owner_id == owner);
        rows.sort_by_key(|t| t.id);
        Ok(rows)
    }

    async fn list_by_owner_and_status(
        &self,
        owner: OwnerId,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>> {
        let mut rows = self.list_by_owner(owner).await?;
        rows.retain(|t| t.status == status);
        Ok(rows)
    }

    async fn list_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self.scan(CF_TRANSACTIONS)?;
        rows.retain(|t| t.transaction_date >= from && t.transaction_date <= to);
        rows.sort_by_key(|t| t.id);
        Ok(rows)
    }

    async fn set_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction> {
        let mut row = self.load_transaction(id)?;
        if !row.status.can_transition_to(status) {
            return Err(LedgerError::TransactionNotReversible(id));
        }
        row.status = status;
        row.updated_at = Some(Utc::now());
        self.put_json(CF_TRANSACTIONS, &id.to_be_bytes(), &row)?;
        Ok(row)
    }
}
