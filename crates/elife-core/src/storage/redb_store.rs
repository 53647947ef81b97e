//! # Redb Record Store
//!
//! Typed access to the nine portal tables.
//!
//! Reads and writes go through closures: [`Store::read`] hands out a
//! snapshot, [`Store::write`] commits when the closure returns `Ok` and
//! aborts otherwise, so a rule that checks and then writes is atomic.

use crate::error::{CoreError, Result};
use crate::types::{
    Admin, Category, Client, FileUpload, Notification, Program, Registration, StopRequest,
    SubProject,
};
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use uuid::Uuid;

// =============================================================================
// TABLE DEFINITIONS
// =============================================================================

type RecordTable = TableDefinition<'static, u128, &'static [u8]>;

const ADMINS: RecordTable = TableDefinition::new("admins");
const CATEGORIES: RecordTable = TableDefinition::new("employment_categories");
const REGISTRATIONS: RecordTable = TableDefinition::new("employment_registrations");
const PROGRAMS: RecordTable = TableDefinition::new("programs");
const SUB_PROJECTS: RecordTable = TableDefinition::new("sub_projects");
const CLIENTS: RecordTable = TableDefinition::new("registered_clients");
const NOTIFICATIONS: RecordTable = TableDefinition::new("notifications");
const STOP_REQUESTS: RecordTable = TableDefinition::new("program_stop_requests");
const FILE_UPLOADS: RecordTable = TableDefinition::new("file_uploads");

const ALL_TABLES: [RecordTable; 9] = [
    ADMINS,
    CATEGORIES,
    REGISTRATIONS,
    PROGRAMS,
    SUB_PROJECTS,
    CLIENTS,
    NOTIFICATIONS,
    STOP_REQUESTS,
    FILE_UPLOADS,
];

/// A record stored in its own table under a `u128` key.
pub trait Record: Serialize + DeserializeOwned {
    const TABLE: RecordTable;
    /// Name used in "not found" errors.
    const KIND: &'static str;

    fn key(&self) -> u128;
}

macro_rules! impl_record {
    ($($ty:ty => $table:ident, $kind:literal);* $(;)?) => {
        $(
            impl Record for $ty {
                const TABLE: RecordTable = $table;
                const KIND: &'static str = $kind;

                fn key(&self) -> u128 {
                    self.id.key()
                }
            }
        )*
    };
}

impl_record!(
    Admin => ADMINS, "admin";
    Category => CATEGORIES, "category";
    Registration => REGISTRATIONS, "registration";
    Program => PROGRAMS, "program";
    SubProject => SUB_PROJECTS, "sub-project";
    Client => CLIENTS, "client";
    Notification => NOTIFICATIONS, "notification";
    StopRequest => STOP_REQUESTS, "stop request";
    FileUpload => FILE_UPLOADS, "file upload";
);

// =============================================================================
// TRANSACTIONS
// =============================================================================

fn get_from<R: Record>(
    table: &impl ReadableTable<u128, &'static [u8]>,
    key: u128,
) -> Result<Option<R>> {
    match table.get(key)? {
        Some(guard) => Ok(Some(postcard::from_bytes(guard.value())?)),
        None => Ok(None),
    }
}

fn all_from<R: Record>(table: &impl ReadableTable<u128, &'static [u8]>) -> Result<Vec<R>> {
    let mut records = Vec::new();
    for entry in table.iter()? {
        let (_, value) = entry?;
        records.push(postcard::from_bytes(value.value())?);
    }
    Ok(records)
}

/// Read access shared by read and write transactions.
pub trait Tables {
    /// Record stored under `key`.
    fn get<R: Record>(&self, key: u128) -> Result<Option<R>>;

    /// Every record of one type, in key order.
    fn all<R: Record>(&self) -> Result<Vec<R>>;

    /// Number of records of one type.
    fn count<R: Record>(&self) -> Result<u64>;

    /// Record stored under `key`, or `NotFound`.
    fn require<R: Record>(&self, key: u128) -> Result<R> {
        self.get(key)?
            .ok_or_else(|| CoreError::not_found(R::KIND, Uuid::from_u128(key)))
    }
}

/// Snapshot handed to [`Store::read`] closures.
pub struct ReadTx {
    txn: ReadTransaction,
}

impl Tables for ReadTx {
    fn get<R: Record>(&self, key: u128) -> Result<Option<R>> {
        let table = self.txn.open_table(R::TABLE)?;
        get_from(&table, key)
    }

    fn all<R: Record>(&self) -> Result<Vec<R>> {
        let table = self.txn.open_table(R::TABLE)?;
        all_from(&table)
    }

    fn count<R: Record>(&self) -> Result<u64> {
        let table = self.txn.open_table(R::TABLE)?;
        Ok(table.len()?)
    }
}

/// Write transaction handed to [`Store::write`] closures.
pub struct WriteTx {
    txn: WriteTransaction,
}

impl WriteTx {
    /// Insert or replace a record.
    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        let bytes = postcard::to_allocvec(record)?;
        let mut table = self.txn.open_table(R::TABLE)?;
        table.insert(record.key(), bytes.as_slice())?;
        Ok(())
    }

    /// Remove a record; returns whether it existed.
    pub fn remove<R: Record>(&self, key: u128) -> Result<bool> {
        let mut table = self.txn.open_table(R::TABLE)?;
        let existed = table.remove(key)?.is_some();
        Ok(existed)
    }
}

impl Tables for WriteTx {
    fn get<R: Record>(&self, key: u128) -> Result<Option<R>> {
        let table = self.txn.open_table(R::TABLE)?;
        get_from(&table, key)
    }

    fn all<R: Record>(&self) -> Result<Vec<R>> {
        let table = self.txn.open_table(R::TABLE)?;
        all_from(&table)
    }

    fn count<R: Record>(&self) -> Result<u64> {
        let table = self.txn.open_table(R::TABLE)?;
        Ok(table.len()?)
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Row counts per table, for `status` output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub admins: u64,
    pub categories: u64,
    pub sub_projects: u64,
    pub programs: u64,
    pub clients: u64,
    pub registrations: u64,
    pub stop_requests: u64,
    pub notifications: u64,
    pub file_uploads: u64,
}

/// The portal database.
pub struct Store {
    db: Database,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open (or create) the database file and make sure every table exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path)?;
        let txn = db.begin_write()?;
        for table in ALL_TABLES {
            txn.open_table(table)?;
        }
        txn.commit()?;
        Ok(Self { db })
    }

    /// Run `f` against a consistent snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&ReadTx) -> Result<T>) -> Result<T> {
        let tx = ReadTx {
            txn: self.db.begin_read()?,
        };
        f(&tx)
    }

    /// Run `f` in a write transaction; commits on `Ok`, aborts on `Err`.
    pub fn write<T>(&self, f: impl FnOnce(&WriteTx) -> Result<T>) -> Result<T> {
        let tx = WriteTx {
            txn: self.db.begin_write()?,
        };
        match f(&tx) {
            Ok(value) => {
                tx.txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                tx.txn.abort()?;
                Err(err)
            }
        }
    }

    /// Row counts for every table.
    pub fn counts(&self) -> Result<TableCounts> {
        self.read(|tx| {
            Ok(TableCounts {
                admins: tx.count::<Admin>()?,
                categories: tx.count::<Category>()?,
                sub_projects: tx.count::<SubProject>()?,
                programs: tx.count::<Program>()?,
                clients: tx.count::<Client>()?,
                registrations: tx.count::<Registration>()?,
                stop_requests: tx.count::<StopRequest>()?,
                notifications: tx.count::<Notification>()?,
                file_uploads: tx.count::<FileUpload>()?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::types::CategoryId;
    use chrono::Utc;
    use tempfile::TempDir;

    fn category(name: &str) -> Category {
        let now = Utc::now();
        Category {
            id: CategoryId::new(),
            name: name.to_string(),
            description: Some("desc".into()),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn open_temp() -> (TempDir, Store) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = Store::open(dir.path().join("store.redb")).expect("Failed to open store");
        (dir, store)
    }

    #[test]
    fn put_get_remove() {
        let (_dir, store) = open_temp();
        let cat = category("foodelife");

        store.write(|tx| tx.put(&cat)).unwrap();
        let loaded = store.read(|tx| tx.get::<Category>(cat.id.key())).unwrap();
        assert_eq!(loaded.as_ref(), Some(&cat));

        assert!(store.write(|tx| tx.remove::<Category>(cat.id.key())).unwrap());
        assert!(!store.write(|tx| tx.remove::<Category>(cat.id.key())).unwrap());
        assert!(matches!(
            store.read(|tx| tx.get::<Category>(cat.id.key())),
            Ok(None)
        ));
        assert!(matches!(
            store.read(|tx| tx.require::<Category>(cat.id.key())),
            Err(CoreError::NotFound { kind: "category", .. })
        ));
    }

    #[test]
    fn failed_write_is_rolled_back() {
        let (_dir, store) = open_temp();
        let cat = category("farmelife");

        let result: Result<()> = store.write(|tx| {
            tx.put(&cat)?;
            Err(CoreError::conflict("abort"))
        });
        assert!(result.is_err());
        assert!(store.read(|tx| tx.all::<Category>()).unwrap().is_empty());
    }

    #[test]
    fn writes_see_their_own_puts() {
        let (_dir, store) = open_temp();
        let seen = store
            .write(|tx| {
                tx.put(&category("a"))?;
                tx.put(&category("b"))?;
                tx.count::<Category>()
            })
            .unwrap();
        assert_eq!(seen, 2);
    }

    #[test]
    fn counts_cover_every_table_and_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.redb");
        {
            let store = Store::open(&path).unwrap();
            assert_eq!(store.counts().unwrap(), TableCounts::default());
            store.write(|tx| tx.put(&category("organelife"))).unwrap();
        }
        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.counts().unwrap().categories, 1);
    }
}
