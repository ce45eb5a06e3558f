use std::io::Write;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::account::{Account, AccountId, AccountStatus, AccountType};
use crate::error::Result;

#[derive(Serialize)]
struct StatementRow<'a> {
    account: AccountId,
    number: &'a str,
    #[serde(rename = "type")]
    account_type: AccountType,
    status: AccountStatus,
    balance: Decimal,
}

/// Writes the closing account statement as CSV.
pub struct StatementWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> StatementWriter<W> {
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(destination),
        }
    }

    pub fn write_accounts(&mut self, accounts: &[Account]) -> Result<()> {
        for account in accounts {
            self.writer.serialize(StatementRow {
                account: account.id,
                number: &account.account_number,
                account_type: account.account_type,
                status: account.status,
                balance: account.balance.value(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
