//! Storage adapters behind the domain ports. The in-memory pair is the
//! reference implementation; RocksDB ships behind the `storage-rocksdb`
//! feature.

pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
