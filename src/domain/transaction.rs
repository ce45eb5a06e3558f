use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::account::{AccountId, OwnerId};
use crate::domain::money::{Amount, Balance};

pub type TransactionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
    Refund,
    Fee,
    InterestCredit,
    LoanDisbursement,
    LoanRepayment,
}

/// Rows are born COMPLETED and transition at most once, to REVERSED or
/// CANCELLED. Both are terminal and mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
    Reversed,
    Cancelled,
}

impl TransactionStatus {
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!((self, next), (Completed, Reversed) | (Completed, Cancelled))
    }
}

/// Input to [`TransactionLedger::append`]; the ledger assigns id, timestamps
/// and the COMPLETED status.
///
/// [`TransactionLedger::append`]: crate::domain::ports::TransactionLedger::append
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub reference: String,
    pub kind: TransactionType,
    pub amount: Amount,
    pub source_account_id: Option<AccountId>,
    pub destination_account_id: Option<AccountId>,
    pub owner_id: OwnerId,
    pub description: Option<String>,
    pub balance_after: Balance,
    pub fee_amount: Option<Amount>,
    pub related_transaction_id: Option<TransactionId>,
}

impl NewTransaction {
    pub fn into_transaction(self, id: TransactionId, now: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            reference: self.reference,
            kind: self.kind,
            amount: self.amount,
            source_account_id: self.source_account_id,
            destination_account_id: self.destination_account_id,
            owner_id: self.owner_id,
            status: TransactionStatus::Completed,
            description: self.description,
            balance_after: self.balance_after,
            fee_amount: self.fee_amount,
            related_transaction_id: self.related_transaction_id,
            transaction_date: now,
            created_at: now,
            updated_at: None,
        }
    }
}

/// One ledger row.
///
/// A transfer is stored as two rows: the debit leg (carries `fee_amount`,
/// `balance_after` snapshots the source) and the credit leg
/// (`related_transaction_id` points at the debit leg, `balance_after`
/// snapshots the destination). A reversal row links back to the original
/// through `related_transaction_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub reference: String,
    pub kind: TransactionType,
    pub amount: Amount,
    pub source_account_id: Option<AccountId>,
    pub destination_account_id: Option<AccountId>,
    pub owner_id: OwnerId,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub balance_after: Balance,
    pub fee_amount: Option<Amount>,
    pub related_transaction_id: Option<TransactionId>,
    pub transaction_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn touches(&self, account: AccountId) -> bool {
        self.source_account_id == Some(account) || self.destination_account_id == Some(account)
    }
}
