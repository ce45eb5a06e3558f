use std::io::Read;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::account::AccountType;
use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Open,
    Deposit,
    Withdraw,
    Transfer,
    Reverse,
    Cancel,
}

/// One row of an operations CSV.
///
/// Columns: `op, account, counterparty, tx, amount, account_type, note`.
/// `open` reads `account` as the owner id; `reverse`/`cancel` read `tx` as
/// the transaction id; the rest address accounts by store id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OperationRecord {
    pub op: OperationKind,
    pub account: Option<u64>,
    pub counterparty: Option<u64>,
    pub tx: Option<u64>,
    pub amount: Option<Decimal>,
    pub account_type: Option<AccountType>,
    pub note: Option<String>,
}

/// Reads operations from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// yielding rows lazily so large files stream.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn records(self) -> impl Iterator<Item = Result<OperationRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
