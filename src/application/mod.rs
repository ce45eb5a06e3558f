//! Application layer: the money movement engine and the account lifecycle
//! service, plus the locking and audit plumbing they orchestrate with.

pub mod accounts;
pub mod audit;
pub mod engine;
pub mod locks;
