//! Domain model: money, accounts, transactions, the generators that mint
//! their external identifiers, the transfer fee policy, and the storage
//! ports.

pub mod account;
pub mod account_number;
pub mod fees;
pub mod money;
pub mod ports;
pub mod reference;
pub mod transaction;
