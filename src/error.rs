use thiserror::Error;

use crate::domain::account::{AccountId, AccountStatus};
use crate::domain::transaction::{TransactionId, TransactionType};

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Classification of a [`LedgerError`].
///
/// Terminal classes are surfaced to the caller verbatim; `Transient` failures
/// are retried by the engine before surfacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    StateConflict,
    BusinessRule,
    Transient,
    Internal,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("account {0} not found")]
    AccountNotFound(AccountId),
    #[error("account {0} is not active")]
    AccountNotActive(AccountId),
    #[error("insufficient funds in account {0}")]
    InsufficientFunds(AccountId),
    #[error("illegal account status transition {from:?} -> {to:?}")]
    InvalidStatusTransition {
        from: AccountStatus,
        to: AccountStatus,
    },
    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),
    #[error("transaction {0} is already in a terminal state")]
    TransactionNotReversible(TransactionId),
    #[error("reversal is not supported for {0:?} transactions")]
    UnsupportedReversal(TransactionType),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("source and destination accounts must differ")]
    SameAccountTransfer,
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("account number {0} is already taken")]
    DuplicateAccountNumber(String),
    #[error("transaction reference {0} is already taken")]
    DuplicateReference(String),
    #[error("timed out acquiring the lock for account {0}")]
    LockTimeout(AccountId),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AccountNotFound(_) | Self::TransactionNotFound(_) => ErrorKind::NotFound,
            Self::InvalidAmount(_)
            | Self::SameAccountTransfer
            | Self::InvalidOperation(_)
            | Self::Csv(_) => ErrorKind::InvalidInput,
            Self::AccountNotActive(_)
            | Self::TransactionNotReversible(_)
            | Self::InvalidStatusTransition { .. } => ErrorKind::StateConflict,
            Self::InsufficientFunds(_) | Self::UnsupportedReversal(_) => ErrorKind::BusinessRule,
            Self::DuplicateAccountNumber(_) | Self::DuplicateReference(_) | Self::LockTimeout(_) => {
                ErrorKind::Transient
            }
            Self::Io(_) | Self::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Whether the engine may retry the failed operation.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
