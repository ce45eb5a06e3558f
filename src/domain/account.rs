use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::money::Balance;
use crate::error::{LedgerError, Result};

pub type AccountId = u64;
pub type OwnerId = u64;
pub type BranchId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Savings,
    Current,
    FixedDeposit,
    RecurringDeposit,
    Salary,
}

impl AccountType {
    /// Two-letter prefix of account numbers of this type.
    pub fn number_prefix(self) -> &'static str {
        match self {
            Self::Savings => "SB",
            Self::Current => "CA",
            Self::FixedDeposit => "FD",
            Self::RecurringDeposit => "RD",
            Self::Salary => "SA",
        }
    }

    /// Minimum balance applied at open time when the request does not set one.
    pub fn default_minimum_balance(self) -> Decimal {
        match self {
            Self::Savings => Decimal::new(100_000, 2),
            Self::Current | Self::Salary => Decimal::ZERO,
            Self::FixedDeposit => Decimal::new(1_000_000, 2),
            Self::RecurringDeposit => Decimal::new(50_000, 2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    PendingApproval,
    Active,
    Frozen,
    Closed,
}

impl AccountStatus {
    /// Transition table: PENDING_APPROVAL -> ACTIVE -> {FROZEN <-> ACTIVE} -> CLOSED.
    /// CLOSED is terminal.
    pub fn can_transition_to(self, next: AccountStatus) -> bool {
        use AccountStatus::*;
        matches!(
            (self, next),
            (PendingApproval, Active)
                | (Active, Frozen)
                | (Active, Closed)
                | (Frozen, Active)
                | (Frozen, Closed)
        )
    }
}

/// Input to [`AccountStore::insert`]; the store assigns id and `created_at`.
///
/// [`AccountStore::insert`]: crate::domain::ports::AccountStore::insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub account_number: String,
    pub account_type: AccountType,
    pub owner_id: OwnerId,
    pub branch_id: Option<BranchId>,
    pub balance: Balance,
    pub minimum_balance: Option<Balance>,
    pub overdraft_limit: Option<Balance>,
    pub interest_rate: Option<Decimal>,
    pub status: AccountStatus,
}

impl NewAccount {
    pub fn into_account(self, id: AccountId, now: DateTime<Utc>) -> Account {
        Account {
            id,
            account_number: self.account_number,
            account_type: self.account_type,
            owner_id: self.owner_id,
            branch_id: self.branch_id,
            balance: self.balance,
            minimum_balance: self.minimum_balance,
            overdraft_limit: self.overdraft_limit,
            interest_rate: self.interest_rate,
            status: self.status,
            created_at: now,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub account_number: String,
    pub account_type: AccountType,
    pub owner_id: OwnerId,
    pub branch_id: Option<BranchId>,
    pub balance: Balance,
    pub minimum_balance: Option<Balance>,
    pub overdraft_limit: Option<Balance>,
    pub interest_rate: Option<Decimal>,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Account {
    /// The balance this account would hold after applying `delta`, when the
    /// mutation is permitted.
    ///
    /// A mutation requires ACTIVE status, and the resulting balance must stay
    /// at or above the minimum balance, or failing that, at or above the
    /// negated overdraft limit. Absent limits read as zero. Every adapter's
    /// `adjust_balance` funnels through here, so the invariant lives in one
    /// place.
    pub fn checked_balance_after(&self, delta: Decimal) -> Result<Balance> {
        if self.status != AccountStatus::Active {
            return Err(LedgerError::AccountNotActive(self.id));
        }
        let next = self.balance.value() + delta;
        let minimum = self.minimum_balance.map(|b| b.value()).unwrap_or(Decimal::ZERO);
        if next >= minimum {
            return Ok(Balance::new(next));
        }
        let overdraft = self.overdraft_limit.map(|b| b.value()).unwrap_or(Decimal::ZERO);
        if next >= -overdraft {
            return Ok(Balance::new(next));
        }
        Err(LedgerError::InsufficientFunds(self.id))
    }
}
