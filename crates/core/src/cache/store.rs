//! The on-disk record store.
//!
//! One table, one row per zero-level record, keyed by `id` with secondary
//! indexes on `parentId` and `type`. Payloads are opaque bytes; the store
//! never looks inside them.

use std::path::{Path, PathBuf};

use gedcache_gedcom::RecordType;
use rusqlite::{Connection, TransactionBehavior, params};
use serde::Serialize;

use super::connection::{self, Access, ConnectionOptions};
use super::hash::generate_record_id;
use crate::Error;

const SCHEMA: &str = include_str!("../../sql/cache.sql");

/// One stored unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub id: String,
    /// Reserved for sub-record caching; always `None` for zero-level records.
    pub parent_id: Option<String>,
    pub record_type: RecordType,
    pub payload: Vec<u8>,
}

impl CacheRecord {
    /// Serialize `value` into a record of `record_type`.
    ///
    /// A missing `id` is replaced by a generated key.
    pub fn encode<T: Serialize + ?Sized>(id: Option<&str>, record_type: RecordType, value: &T) -> Result<Self, Error> {
        let payload = serde_json::to_vec(value)?;
        let id = id.map_or_else(generate_record_id, str::to_string);
        Ok(Self { id, parent_id: None, record_type, payload })
    }
}

/// Exclusive owner of the cache's writer connection.
#[derive(Debug)]
pub struct RecordStore {
    conn: Connection,
    path: PathBuf,
}

impl RecordStore {
    /// Open or create the cache file at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::open_with(path, ConnectionOptions::default())
    }

    /// Open or create the cache file at `path`.
    ///
    /// Fails with [`Error::ConnectFailed`] if the file cannot be created or
    /// is not a database.
    pub fn open_with(path: impl AsRef<Path>, options: ConnectionOptions) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let conn = connection::open(&path, Access::Write, &options)?;
        Ok(Self { conn, path })
    }

    /// Open an in-memory store for testing.
    ///
    /// Collections cannot be opened against it; they need a file of their own to connect to.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = connection::open_in_memory(&ConnectionOptions::default())?;
        Ok(Self { conn, path: PathBuf::from(":memory:") })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the table and indexes if they are missing.
    pub fn ensure_schema(&self) -> Result<(), Error> {
        ensure_schema(&self.conn)
    }

    /// Delete every row, keeping the schema. Returns the number deleted.
    pub fn clear(&self) -> Result<usize, Error> {
        clear(&self.conn)
    }

    /// Insert one record. Bulk fills go through [`RecordStore::transaction`].
    pub fn insert(&self, record: &CacheRecord) -> Result<(), Error> {
        insert(&self.conn, record)
    }

    pub fn count_rows(&self) -> Result<u64, Error> {
        count_rows(&self.conn)
    }

    pub fn count_type(&self, record_type: RecordType) -> Result<u64, Error> {
        count_type(&self.conn, record_type)
    }

    /// Begin a write transaction.
    ///
    /// The writer lock is taken immediately. Dropping the returned handle
    /// without calling [`StoreTransaction::commit`] rolls everything back.
    pub fn transaction(&mut self) -> Result<StoreTransaction<'_>, Error> {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(StoreTransaction { tx })
    }
}

/// A write transaction over the store.
#[derive(Debug)]
pub struct StoreTransaction<'a> {
    tx: rusqlite::Transaction<'a>,
}

impl StoreTransaction<'_> {
    pub fn ensure_schema(&self) -> Result<(), Error> {
        ensure_schema(&self.tx)
    }

    pub fn clear(&self) -> Result<usize, Error> {
        clear(&self.tx)
    }

    pub fn insert(&self, record: &CacheRecord) -> Result<(), Error> {
        insert(&self.tx, record)
    }

    pub fn count_rows(&self) -> Result<u64, Error> {
        count_rows(&self.tx)
    }

    pub fn commit(self) -> Result<(), Error> {
        self.tx.commit().map_err(Error::from)
    }

    pub fn rollback(self) -> Result<(), Error> {
        self.tx.rollback().map_err(Error::from)
    }
}

fn ensure_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SCHEMA).map_err(Error::SchemaFailed)
}

fn clear(conn: &Connection) -> Result<usize, Error> {
    let deleted = conn.execute("DELETE FROM cache", [])?;
    tracing::debug!(deleted, "cleared cache rows");
    Ok(deleted)
}

fn insert(conn: &Connection, record: &CacheRecord) -> Result<(), Error> {
    let mut stmt = conn
        .prepare_cached("INSERT INTO cache (id, parentId, type, payload) VALUES (?1, ?2, ?3, ?4)")
        .map_err(|source| Error::WriteFailed { id: record.id.clone(), source })?;

    stmt.execute(params![&record.id, &record.parent_id, record.record_type.tag(), &record.payload])
        .map_err(|source| Error::WriteFailed { id: record.id.clone(), source })?;
    Ok(())
}

fn count_rows(conn: &Connection) -> Result<u64, Error> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Row count that treats a missing table as empty.
///
/// A fill that fails on a new file rolls back the schema too, leaving a
/// database without the `cache` table.
pub(crate) fn count_filled_rows(conn: &Connection) -> Result<u64, Error> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'cache')",
        [],
        |row| row.get(0),
    )?;
    if !exists {
        return Ok(0);
    }
    count_rows(conn)
}

fn count_type(conn: &Connection, record_type: RecordType) -> Result<u64, Error> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM cache WHERE type = ?1", params![record_type.tag()], |row| row.get(0))?;
    Ok(count as u64)
}
