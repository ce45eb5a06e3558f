//! A single-currency core banking ledger: accounts with balance invariants,
//! an append-only transaction ledger, and a money movement engine that
//! deposits, withdraws, transfers (with fees) and reverses atomically.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;

pub use error::{ErrorKind, LedgerError, Result};
