//! # Storage Module
//!
//! Disk-backed record store using redb.
//!
//! Uses redb embedded database for:
//! - ACID transactions (every check-then-write rule runs in one write txn)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! One table per record type, keyed by the record's UUID as `u128`, values
//! encoded with postcard.

mod redb_store;

pub use redb_store::{ReadTx, Record, Store, TableCounts, Tables, WriteTx};
