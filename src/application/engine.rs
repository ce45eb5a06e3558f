use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::application::audit::{AuditOperation, AuditRecord, AuditSink, FaultRecord, NoopAuditSink};
use crate::application::locks::AccountLocks;
use crate::domain::account::{Account, AccountId, AccountStatus, OwnerId};
use crate::domain::fees;
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{AccountStoreRef, TransactionLedgerRef};
use crate::domain::reference::ReferenceGenerator;
use crate::domain::transaction::{
    NewTransaction, Transaction, TransactionId, TransactionStatus, TransactionType,
};
use crate::error::{ErrorKind, LedgerError, Result};

/// Attempts per operation before a transient failure surfaces to the caller.
const MAX_TRANSIENT_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(25);
/// Reference regenerations per row before the collision is handed to the
/// transient retry loop.
const MAX_REFERENCE_ATTEMPTS: u32 = 5;

/// The money movement engine: deposit, withdraw, transfer, reverse.
///
/// Each operation is one atomic unit of work. The engine takes the exclusive
/// locks of every account it will touch, validates, applies balance deltas
/// through the account store, appends the ledger rows, and only then releases
/// the locks. A failure after a first mutation compensates the applied deltas
/// before the error returns, so callers observe either the full effect or
/// none of it.
pub struct LedgerEngine {
    accounts: AccountStoreRef,
    ledger: TransactionLedgerRef,
    locks: Arc<AccountLocks>,
    references: ReferenceGenerator,
    audit: Arc<dyn AuditSink>,
}

impl LedgerEngine {
    pub fn new(accounts: AccountStoreRef, ledger: TransactionLedgerRef) -> Self {
        Self {
            accounts,
            ledger,
            locks: Arc::new(AccountLocks::default()),
            references: ReferenceGenerator::new(),
            audit: Arc::new(NoopAuditSink),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.locks = Arc::new(AccountLocks::new(timeout));
        self
    }

    /// The engine's lock registry. Collaborators that mutate accounts out of
    /// band (status transitions in particular) must serialize through it.
    pub fn account_locks(&self) -> Arc<AccountLocks> {
        self.locks.clone()
    }

    /// Credits `amount` to the account and appends a DEPOSIT row.
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        let amount = Amount::new(amount)?;
        self.retry_transient("deposit", || self.deposit_once(account_id, amount, description))
            .await
    }

    /// Debits `amount` from the account and appends a WITHDRAWAL row.
    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        let amount = Amount::new(amount)?;
        self.retry_transient("withdraw", || {
            self.withdraw_once(account_id, amount, description)
        })
        .await
    }

    /// Moves `amount` between two accounts, charging the transfer fee to the
    /// source. Appends two linked rows and returns the debit leg.
    pub async fn transfer(
        &self,
        source_id: AccountId,
        destination_id: AccountId,
        amount: Decimal,
        description: &str,
    ) -> Result<Transaction> {
        let amount = Amount::new(amount)?;
        if source_id == destination_id {
            return Err(LedgerError::SameAccountTransfer);
        }
        self.retry_transient("transfer", || {
            self.transfer_once(source_id, destination_id, amount, description)
        })
        .await
    }

    /// Undoes the balance effect of a COMPLETED transaction, appends a
    /// REFUND row linked to it, and marks it REVERSED.
    pub async fn reverse(&self, transaction_id: TransactionId) -> Result<Transaction> {
        self.retry_transient("reverse", || self.reverse_once(transaction_id))
            .await
    }

    /// Marks a COMPLETED row CANCELLED. No balance effect; the row becomes
    /// ineligible for reversal.
    pub async fn cancel(&self, transaction_id: TransactionId) -> Result<Transaction> {
        let row = self
            .ledger
            .set_status(transaction_id, TransactionStatus::Cancelled)
            .await?;
        info!(transaction = transaction_id, "transaction cancelled");
        Ok(row)
    }

    pub async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.ledger.get(id).await
    }

    pub async fn transaction_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        self.ledger.get_by_reference(reference).await
    }

    /// Every row that touched the account, in append order.
    pub async fn statement(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        self.ledger.list_by_account(account_id).await
    }

    pub async fn transactions_for_owner(&self, owner: OwnerId) -> Result<Vec<Transaction>> {
        self.ledger.list_by_owner(owner).await
    }

    pub async fn transactions_for_owner_with_status(
        &self,
        owner: OwnerId,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>> {
        self.ledger.list_by_owner_and_status(owner, status).await
    }

    pub async fn transactions_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        self.ledger.list_between(from, to).await
    }

    async fn deposit_once(
        &self,
        account_id: AccountId,
        amount: Amount,
        description: &str,
    ) -> Result<Transaction> {
        let _guard = self.locks.acquire(account_id).await?;
        let account = self.accounts.adjust_balance(account_id, amount.value()).await?;

        let appended = self
            .append_row(|reference| NewTransaction {
                reference,
                kind: TransactionType::Deposit,
                amount,
                source_account_id: None,
                destination_account_id: Some(account_id),
                owner_id: account.owner_id,
                description: normalize_description(description),
                balance_after: account.balance,
                fee_amount: None,
                related_transaction_id: None,
            })
            .await;
        let row = match appended {
            Ok(row) => row,
            Err(err) => {
                let _ = self.accounts.adjust_balance(account_id, -amount.value()).await;
                self.report_fault(AuditOperation::Deposit, &err);
                return Err(err);
            }
        };

        self.emit_audit(AuditOperation::Deposit, &account, -amount.value(), &row);
        info!(
            account = account_id,
            reference = %row.reference,
            amount = %amount.value(),
            "deposit completed"
        );
        Ok(row)
    }

    async fn withdraw_once(
        &self,
        account_id: AccountId,
        amount: Amount,
        description: &str,
    ) -> Result<Transaction> {
        let _guard = self.locks.acquire(account_id).await?;
        let account = self
            .accounts
            .adjust_balance(account_id, -amount.value())
            .await?;

        let appended = self
            .append_row(|reference| NewTransaction {
                reference,
                kind: TransactionType::Withdrawal,
                amount,
                source_account_id: Some(account_id),
                destination_account_id: None,
                owner_id: account.owner_id,
                description: normalize_description(description),
                balance_after: account.balance,
                fee_amount: None,
                related_transaction_id: None,
            })
            .await;
        let row = match appended {
            Ok(row) => row,
            Err(err) => {
                let _ = self.accounts.adjust_balance(account_id, amount.value()).await;
                self.report_fault(AuditOperation::Withdrawal, &err);
                return Err(err);
            }
        };

        self.emit_audit(AuditOperation::Withdrawal, &account, amount.value(), &row);
        info!(
            account = account_id,
            reference = %row.reference,
            amount = %amount.value(),
            "withdrawal completed"
        );
        Ok(row)
    }

    async fn transfer_once(
        &self,
        source_id: AccountId,
        destination_id: AccountId,
        amount: Amount,
        description: &str,
    ) -> Result<Transaction> {
        let _guards = self.locks.acquire_pair(source_id, destination_id).await?;

        // Both sides are validated up front so no mutation can fail after the
        // first delta lands.
        let source = self.fetch_active(source_id).await?;
        let destination = self.fetch_active(destination_id).await?;

        let fee = fees::transfer_fee(amount);
        let total_debit = amount.value() + fee.value();

        // The one source-side invariant check, inclusive of the fee.
        let source_after = self.accounts.adjust_balance(source_id, -total_debit).await?;
        let destination_after = match self
            .accounts
            .adjust_balance(destination_id, amount.value())
            .await
        {
            Ok(account) => account,
            Err(err) => {
                let _ = self.accounts.adjust_balance(source_id, total_debit).await;
                self.report_fault(AuditOperation::Transfer, &err);
                return Err(err);
            }
        };

        let unwind_balances = || async {
            let _ = self
                .accounts
                .adjust_balance(destination_id, -amount.value())
                .await;
            let _ = self.accounts.adjust_balance(source_id, total_debit).await;
        };

        let debit = match self
            .append_row(|reference| NewTransaction {
                reference,
                kind: TransactionType::Transfer,
                amount,
                source_account_id: Some(source_id),
                destination_account_id: Some(destination_id),
                owner_id: source.owner_id,
                description: normalize_description(description),
                balance_after: source_after.balance,
                fee_amount: Some(fee),
                related_transaction_id: None,
            })
            .await
        {
            Ok(row) => row,
            Err(err) => {
                unwind_balances().await;
                self.report_fault(AuditOperation::Transfer, &err);
                return Err(err);
            }
        };

        let credit = match self
            .append_row(|reference| NewTransaction {
                reference,
                kind: TransactionType::Transfer,
                amount,
                source_account_id: Some(source_id),
                destination_account_id: Some(destination_id),
                owner_id: destination.owner_id,
                description: normalize_description(description),
                balance_after: destination_after.balance,
                fee_amount: None,
                related_transaction_id: Some(debit.id),
            })
            .await
        {
            Ok(row) => row,
            Err(err) => {
                unwind_balances().await;
                let _ = self
                    .ledger
                    .set_status(debit.id, TransactionStatus::Cancelled)
                    .await;
                self.report_fault(AuditOperation::Transfer, &err);
                return Err(err);
            }
        };

        self.emit_audit(AuditOperation::Transfer, &source_after, total_debit, &debit);
        self.emit_audit(
            AuditOperation::Transfer,
            &destination_after,
            -amount.value(),
            &credit,
        );
        info!(
            source = source_id,
            destination = destination_id,
            debit_leg = debit.id,
            credit_leg = credit.id,
            amount = %amount.value(),
            fee = %fee.value(),
            "transfer completed"
        );
        Ok(debit)
    }

    async fn reverse_once(&self, transaction_id: TransactionId) -> Result<Transaction> {
        let original = self
            .ledger
            .get(transaction_id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;
        if original.status != TransactionStatus::Completed {
            return Err(LedgerError::TransactionNotReversible(transaction_id));
        }

        match original.kind {
            TransactionType::Deposit => self.reverse_deposit(original).await,
            TransactionType::Withdrawal => self.reverse_withdrawal(original).await,
            TransactionType::Transfer => self.reverse_transfer(original).await,
            // A refund row is itself a reversal artifact.
            TransactionType::Refund => Err(LedgerError::TransactionNotReversible(transaction_id)),
            kind @ (TransactionType::Fee
            | TransactionType::InterestCredit
            | TransactionType::LoanDisbursement
            | TransactionType::LoanRepayment) => Err(LedgerError::UnsupportedReversal(kind)),
        }
    }

    async fn reverse_deposit(&self, original: Transaction) -> Result<Transaction> {
        let account_id = original
            .destination_account_id
            .ok_or_else(|| LedgerError::storage("deposit row has no destination account"))?;
        let _guard = self.locks.acquire(account_id).await?;
        let original = self.fetch_completed(original.id).await?;
        let amount = original.amount;

        let account = self
            .accounts
            .adjust_balance(account_id, -amount.value())
            .await?;
        self.commit_reversal(
            &original,
            account,
            amount.value(),
            NewRefund {
                source_account_id: Some(account_id),
                destination_account_id: None,
            },
        )
        .await
    }

    async fn reverse_withdrawal(&self, original: Transaction) -> Result<Transaction> {
        let account_id = original
            .source_account_id
            .ok_or_else(|| LedgerError::storage("withdrawal row has no source account"))?;
        let _guard = self.locks.acquire(account_id).await?;
        let original = self.fetch_completed(original.id).await?;
        let amount = original.amount;

        let account = self
            .accounts
            .adjust_balance(account_id, amount.value())
            .await?;
        self.commit_reversal(
            &original,
            account,
            -amount.value(),
            NewRefund {
                source_account_id: None,
                destination_account_id: Some(account_id),
            },
        )
        .await
    }

    async fn reverse_transfer(&self, original: Transaction) -> Result<Transaction> {
        let source_id = original
            .source_account_id
            .ok_or_else(|| LedgerError::storage("transfer row has no source account"))?;
        let destination_id = original
            .destination_account_id
            .ok_or_else(|| LedgerError::storage("transfer row has no destination account"))?;
        let _guards = self.locks.acquire_pair(source_id, destination_id).await?;
        let original = self.fetch_completed(original.id).await?;
        let amount = original.amount.value();

        // Take the money back from the destination first; that is the side
        // that can bounce on InsufficientFunds.
        let destination_after = self.accounts.adjust_balance(destination_id, -amount).await?;
        let source_after = match self.accounts.adjust_balance(source_id, amount).await {
            Ok(account) => account,
            Err(err) => {
                let _ = self.accounts.adjust_balance(destination_id, amount).await;
                return Err(err);
            }
        };

        let refund = match self
            .append_refund(&original, destination_after.balance, NewRefund {
                source_account_id: Some(destination_id),
                destination_account_id: Some(source_id),
            })
            .await
        {
            Ok(row) => row,
            Err(err) => {
                let _ = self.accounts.adjust_balance(destination_id, amount).await;
                let _ = self.accounts.adjust_balance(source_id, -amount).await;
                self.report_fault(AuditOperation::Reversal, &err);
                return Err(err);
            }
        };

        if let Err(err) = self
            .ledger
            .set_status(original.id, TransactionStatus::Reversed)
            .await
        {
            let _ = self.accounts.adjust_balance(destination_id, amount).await;
            let _ = self.accounts.adjust_balance(source_id, -amount).await;
            let _ = self
                .ledger
                .set_status(refund.id, TransactionStatus::Cancelled)
                .await;
            return Err(err);
        }

        self.emit_audit(AuditOperation::Reversal, &destination_after, amount, &refund);
        self.emit_audit(AuditOperation::Reversal, &source_after, -amount, &refund);
        info!(
            original = original.id,
            refund = refund.id,
            "transfer reversed"
        );
        Ok(refund)
    }

    /// Appends the refund row and flips the original to REVERSED, unwinding
    /// the single applied delta if either step fails.
    async fn commit_reversal(
        &self,
        original: &Transaction,
        account: Account,
        undo_delta: Decimal,
        placement: NewRefund,
    ) -> Result<Transaction> {
        let account_id = account.id;
        let refund = match self.append_refund(original, account.balance, placement).await {
            Ok(row) => row,
            Err(err) => {
                let _ = self.accounts.adjust_balance(account_id, undo_delta).await;
                self.report_fault(AuditOperation::Reversal, &err);
                return Err(err);
            }
        };

        if let Err(err) = self
            .ledger
            .set_status(original.id, TransactionStatus::Reversed)
            .await
        {
            let _ = self.accounts.adjust_balance(account_id, undo_delta).await;
            let _ = self
                .ledger
                .set_status(refund.id, TransactionStatus::Cancelled)
                .await;
            return Err(err);
        }

        self.emit_audit(AuditOperation::Reversal, &account, undo_delta, &refund);
        info!(
            original = original.id,
            refund = refund.id,
            account = account_id,
            "transaction reversed"
        );
        Ok(refund)
    }

    async fn append_refund(
        &self,
        original: &Transaction,
        balance_after: Balance,
        placement: NewRefund,
    ) -> Result<Transaction> {
        self.append_row(|reference| NewTransaction {
            reference,
            kind: TransactionType::Refund,
            amount: original.amount,
            source_account_id: placement.source_account_id,
            destination_account_id: placement.destination_account_id,
            owner_id: original.owner_id,
            description: Some(format!("reversal of {}", original.reference)),
            balance_after,
            fee_amount: None,
            related_transaction_id: Some(original.id),
        })
        .await
    }

    async fn fetch_active(&self, id: AccountId) -> Result<Account> {
        let account = self
            .accounts
            .get(id)
            .await?
            .ok_or(LedgerError::AccountNotFound(id))?;
        if account.status != AccountStatus::Active {
            return Err(LedgerError::AccountNotActive(id));
        }
        Ok(account)
    }

    /// Re-reads a row under the operation's account locks; a concurrent
    /// reversal or cancellation may have won since the unlocked read.
    async fn fetch_completed(&self, id: TransactionId) -> Result<Transaction> {
        let row = self
            .ledger
            .get(id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(id))?;
        if row.status != TransactionStatus::Completed {
            return Err(LedgerError::TransactionNotReversible(id));
        }
        Ok(row)
    }

    /// Appends a row, regenerating the reference on collision.
    async fn append_row<F>(&self, build: F) -> Result<Transaction>
    where
        F: Fn(String) -> NewTransaction,
    {
        let mut attempts = 0u32;
        loop {
            let row = build(self.references.generate());
            match self.ledger.append(row).await {
                Err(LedgerError::DuplicateReference(reference))
                    if attempts + 1 < MAX_REFERENCE_ATTEMPTS =>
                {
                    attempts += 1;
                    warn!(%reference, attempts, "reference collision, regenerating");
                }
                outcome => return outcome,
            }
        }
    }

    async fn retry_transient<T, Fut, F>(&self, operation: &'static str, mut run: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match run().await {
                Err(err) if err.is_transient() && attempt + 1 < MAX_TRANSIENT_ATTEMPTS => {
                    attempt += 1;
                    warn!(operation, attempt, error = %err, "transient failure, retrying");
                    sleep(RETRY_BACKOFF * attempt).await;
                }
                outcome => return outcome,
            }
        }
    }

    /// `undo_delta` is the signed delta that would undo the mutation, i.e.
    /// the negation of what was applied; the pre-mutation balance falls out
    /// of it.
    fn emit_audit(
        &self,
        operation: AuditOperation,
        account: &Account,
        undo_delta: Decimal,
        row: &Transaction,
    ) {
        self.audit.record(AuditRecord {
            operation,
            actor: row.owner_id,
            account_id: account.id,
            balance_before: account.balance.value() + undo_delta,
            balance_after: account.balance.value(),
            transaction_id: row.id,
            reference: row.reference.clone(),
            at: Utc::now(),
        });
    }

    fn report_fault(&self, operation: AuditOperation, err: &LedgerError) {
        if err.kind() == ErrorKind::Internal {
            self.audit.fault(FaultRecord {
                operation,
                message: err.to_string(),
                at: Utc::now(),
            });
        }
    }
}

/// Where a refund row points, which depends on the original's type.
struct NewRefund {
    source_account_id: Option<AccountId>,
    destination_account_id: Option<AccountId>,
}

fn normalize_description(description: &str) -> Option<String> {
    let trimmed = description.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
