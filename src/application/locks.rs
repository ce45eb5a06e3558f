use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;

use crate::domain::account::AccountId;
use crate::error::{LedgerError, Result};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-account exclusive locks.
///
/// Every engine operation holds the locks of the accounts it mutates for its
/// whole commit, which makes the per-account transaction sequence
/// linearizable. Multi-account operations acquire in ascending account-id
/// order, so two crossing transfers cannot deadlock. Acquisition is bounded;
/// expiry surfaces as the retryable `LockTimeout`.
///
/// The registry keeps one entry per account ever locked; entries are as
/// small as an `Arc<Mutex<()>>` and the account set is dense.
pub struct AccountLocks {
    registry: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl AccountLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    async fn handle(&self, id: AccountId) -> Arc<Mutex<()>> {
        let mut registry = self.registry.lock().await;
        registry.entry(id).or_default().clone()
    }

    pub async fn acquire(&self, id: AccountId) -> Result<OwnedMutexGuard<()>> {
        let handle = self.handle(id).await;
        timeout(self.timeout, handle.lock_owned())
            .await
            .map_err(|_| LedgerError::LockTimeout(id))
    }

    /// Acquires both locks in ascending account-id order.
    pub async fn acquire_pair(
        &self,
        a: AccountId,
        b: AccountId,
    ) -> Result<(OwnedMutexGuard<()>, OwnedMutexGuard<()>)> {
        if a <= b {
            let first = self.acquire(a).await?;
            let second = self.acquire(b).await?;
            Ok((first, second))
        } else {
            let second = self.acquire(b).await?;
            let first = self.acquire(a).await?;
            Ok((first, second))
        }
    }
}

impl Default for AccountLocks {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}
