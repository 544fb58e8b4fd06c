//! Lazy, type-scoped views over the cache.
//!
//! A [`LazyRecordCollection`] owns its own read-only connection and runs two
//! independent queries against it:
//!
//! - A forward cursor over every row of one type, holding at most one row
//!   in a lookahead buffer. The cursor remembers the last `rowid` it handed
//!   out and asks for the next one, so no statement stays open between pulls.
//! - A point lookup by `id`, reissued per call. It never moves the cursor.
//!
//! Payloads are decoded only when a value is actually read.

use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use gedcache_gedcom::RecordType;
use rusqlite::{Connection, OptionalExtension, params};
use serde::de::DeserializeOwned;

use super::connection::{self, Access, ConnectionOptions};
use crate::Error;

const NEXT_ROW: &str = "SELECT rowid, id, payload FROM cache WHERE type = ?1 AND rowid > ?2 ORDER BY rowid LIMIT 1";
const LOOKUP: &str = "SELECT payload FROM cache WHERE type = ?1 AND id = ?2 LIMIT 1";
const COUNT: &str = "SELECT COUNT(*) FROM cache WHERE type = ?1";

/// Cursor position before the first row.
const START: i64 = i64::MIN;

/// A row pulled from the cursor but not yet consumed.
#[derive(Debug)]
struct BufferedRow {
    id: String,
    payload: Vec<u8>,
}

/// Read-only, ordered, key-addressable view of every cached record of one type.
pub struct LazyRecordCollection<T> {
    conn: Connection,
    record_type: RecordType,
    position: i64,
    buffered: Option<BufferedRow>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for LazyRecordCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRecordCollection")
            .field("record_type", &self.record_type)
            .field("position", &self.position)
            .field("buffered", &self.buffered.as_ref().map(|row| &row.id))
            .finish()
    }
}

impl<T> LazyRecordCollection<T> {
    /// Open a collection over the cache file at `path`.
    ///
    /// The file must already exist; a collection never creates one.
    pub fn open(path: &Path, record_type: RecordType, options: ConnectionOptions) -> Result<Self, Error> {
        let conn = connection::open(path, Access::Read, &options)?;
        Ok(Self { conn, record_type, position: START, buffered: None, _payload: PhantomData })
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Whether another row is available, pulling it into the buffer if needed.
    pub fn has_next(&mut self) -> Result<bool, Error> {
        if self.buffered.is_some() {
            return Ok(true);
        }

        let row = {
            let mut stmt = self.conn.prepare_cached(NEXT_ROW)?;
            stmt.query_row(params![self.record_type.tag(), self.position], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?))
            })
            .optional()?
        };

        Ok(match row {
            Some((rowid, id, payload)) => {
                self.position = rowid;
                self.buffered = Some(BufferedRow { id, payload });
                true
            }
            None => false,
        })
    }

    /// Key of the buffered row without decoding its payload.
    pub fn peek_key(&mut self) -> Result<Option<&str>, Error> {
        self.has_next()?;
        Ok(self.buffered.as_ref().map(|row| row.id.as_str()))
    }

    /// Drop the buffered row so the next read pulls a fresh one.
    pub fn advance(&mut self) {
        self.buffered = None;
    }

    /// Rewind to the first row of the type.
    pub fn restart(&mut self) {
        self.position = START;
        self.buffered = None;
    }

    pub fn contains_key(&self, id: &str) -> Result<bool, Error> {
        Ok(self.lookup(id)?.is_some())
    }

    /// Number of rows of this type, without decoding anything.
    pub fn len(&self) -> Result<u64, Error> {
        let count: i64 = self.conn.query_row(COUNT, params![self.record_type.tag()], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Accepted for interface parity with owned collections; nothing is written.
    ///
    /// Always returns `false`. Writes go through the store.
    pub fn insert(&mut self, id: &str, _value: T) -> bool {
        tracing::debug!(%id, record_type = %self.record_type, "ignoring write to read-only collection");
        false
    }

    /// Accepted for interface parity with owned collections; nothing is removed.
    pub fn remove(&mut self, id: &str) -> bool {
        tracing::debug!(%id, record_type = %self.record_type, "ignoring removal from read-only collection");
        false
    }

    fn lookup(&self, id: &str) -> Result<Option<Vec<u8>>, Error> {
        let mut stmt = self.conn.prepare_cached(LOOKUP)?;
        stmt.query_row(params![self.record_type.tag(), id], |row| row.get(0)).optional().map_err(Error::from)
    }
}

impl<T: DeserializeOwned> LazyRecordCollection<T> {
    /// Decode the buffered row without advancing.
    ///
    /// Returns `None` once the cursor is exhausted.
    pub fn peek(&mut self) -> Result<Option<(String, T)>, Error> {
        if !self.has_next()? {
            return Ok(None);
        }
        match &self.buffered {
            Some(row) => Ok(Some((row.id.clone(), serde_json::from_slice(&row.payload)?))),
            None => Ok(None),
        }
    }

    pub fn get(&self, id: &str) -> Result<Option<T>, Error> {
        match self.lookup(id)? {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }

    /// Decode the first row of the type, leaving the cursor untouched.
    pub fn first(&self) -> Result<Option<T>, Error> {
        let mut stmt = self.conn.prepare_cached(NEXT_ROW)?;
        let payload: Option<Vec<u8>> =
            stmt.query_row(params![self.record_type.tag(), START], |row| row.get(2)).optional()?;
        payload.map(|bytes| serde_json::from_slice(&bytes).map_err(Error::from)).transpose()
    }
}

impl<T: DeserializeOwned> Iterator for LazyRecordCollection<T> {
    type Item = Result<(String, T), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => return Some(Err(e)),
        }
        let row = self.buffered.take()?;
        Some(serde_json::from_slice(&row.payload).map(|value| (row.id, value)).map_err(Error::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::{CacheRecord, RecordStore};
    use std::path::PathBuf;

    fn seeded(records: &[(&str, RecordType, &str)]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        let mut store = RecordStore::open(&path).unwrap();
        let tx = store.transaction().unwrap();
        tx.ensure_schema().unwrap();
        for (id, ty, value) in records {
            tx.insert(&CacheRecord::encode(Some(*id), *ty, value).unwrap()).unwrap();
        }
        tx.commit().unwrap();
        (dir, path)
    }

    fn open(path: &Path, ty: RecordType) -> LazyRecordCollection<String> {
        LazyRecordCollection::open(path, ty, ConnectionOptions::default()).unwrap()
    }

    #[test]
    fn test_iterates_in_insert_order() {
        let (_dir, path) = seeded(&[
            ("I2", RecordType::Indi, "b"),
            ("F1", RecordType::Fam, "f"),
            ("I1", RecordType::Indi, "a"),
            ("I3", RecordType::Indi, "c"),
        ]);

        let ids: Vec<String> = open(&path, RecordType::Indi).map(|item| item.unwrap().0).collect();
        assert_eq!(ids, vec!["I2", "I1", "I3"]);
    }

    #[test]
    fn test_restart_repeats_same_order() {
        let (_dir, path) =
            seeded(&[("I1", RecordType::Indi, "a"), ("I2", RecordType::Indi, "b"), ("I3", RecordType::Indi, "c")]);
        let mut collection = open(&path, RecordType::Indi);

        let first: Vec<String> = collection.by_ref().map(|item| item.unwrap().0).collect();
        collection.restart();
        collection.restart();
        let second: Vec<String> = collection.by_ref().map(|item| item.unwrap().0).collect();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_restart_mid_iteration() {
        let (_dir, path) = seeded(&[("I1", RecordType::Indi, "a"), ("I2", RecordType::Indi, "b")]);
        let mut collection = open(&path, RecordType::Indi);

        assert_eq!(collection.next().unwrap().unwrap().0, "I1");
        collection.restart();
        assert_eq!(collection.peek_key().unwrap(), Some("I1"));
    }

    #[test]
    fn test_empty_type() {
        let (_dir, path) = seeded(&[("I1", RecordType::Indi, "a")]);
        let mut collection = open(&path, RecordType::Repo);

        assert!(!collection.has_next().unwrap());
        assert!(collection.peek().unwrap().is_none());
        assert!(collection.peek_key().unwrap().is_none());
        assert!(collection.is_empty().unwrap());
        assert!(collection.next().is_none());
    }

    #[test]
    fn test_peek_does_not_advance() {
        let (_dir, path) = seeded(&[("I1", RecordType::Indi, "a"), ("I2", RecordType::Indi, "b")]);
        let mut collection = open(&path, RecordType::Indi);

        assert!(collection.has_next().unwrap());
        assert!(collection.has_next().unwrap());
        assert_eq!(collection.peek().unwrap(), Some(("I1".to_string(), "a".to_string())));
        assert_eq!(collection.peek().unwrap(), Some(("I1".to_string(), "a".to_string())));

        collection.advance();
        assert_eq!(collection.peek().unwrap(), Some(("I2".to_string(), "b".to_string())));

        collection.advance();
        assert!(!collection.has_next().unwrap());
    }

    #[test]
    fn test_advance_without_buffer_does_not_skip() {
        let (_dir, path) = seeded(&[("I1", RecordType::Indi, "a")]);
        let mut collection = open(&path, RecordType::Indi);

        collection.advance();
        assert_eq!(collection.peek_key().unwrap(), Some("I1"));
    }

    #[test]
    fn test_lookup_is_independent_of_cursor() {
        let (_dir, path) =
            seeded(&[("I1", RecordType::Indi, "a"), ("I2", RecordType::Indi, "b"), ("I3", RecordType::Indi, "c")]);
        let mut collection = open(&path, RecordType::Indi);

        assert_eq!(collection.next().unwrap().unwrap().0, "I1");
        assert_eq!(collection.get("I3").unwrap(), Some("c".to_string()));
        assert!(collection.contains_key("I1").unwrap());
        assert_eq!(collection.next().unwrap().unwrap().0, "I2");
    }

    #[test]
    fn test_lookup_is_type_scoped() {
        let (_dir, path) = seeded(&[("I1", RecordType::Indi, "a"), ("F1", RecordType::Fam, "f")]);
        let collection = open(&path, RecordType::Indi);

        assert!(collection.contains_key("I1").unwrap());
        assert!(!collection.contains_key("F1").unwrap());
        assert_eq!(collection.get("F1").unwrap(), None);
        assert_eq!(collection.get("missing").unwrap(), None);
    }

    #[test]
    fn test_len_counts_type() {
        let (_dir, path) =
            seeded(&[("I1", RecordType::Indi, "a"), ("I2", RecordType::Indi, "b"), ("F1", RecordType::Fam, "f")]);
        assert_eq!(open(&path, RecordType::Indi).len().unwrap(), 2);
        assert_eq!(open(&path, RecordType::Fam).len().unwrap(), 1);
    }

    #[test]
    fn test_first_leaves_cursor() {
        let (_dir, path) = seeded(&[("I1", RecordType::Indi, "a"), ("I2", RecordType::Indi, "b")]);
        let mut collection = open(&path, RecordType::Indi);

        collection.next().unwrap().unwrap();
        assert_eq!(collection.first().unwrap(), Some("a".to_string()));
        assert_eq!(collection.next().unwrap().unwrap().0, "I2");
    }

    #[test]
    fn test_writes_are_ignored() {
        let (_dir, path) = seeded(&[("I1", RecordType::Indi, "a")]);
        let mut collection = open(&path, RecordType::Indi);

        assert!(!collection.insert("I9", "z".to_string()));
        assert!(!collection.remove("I1"));
        assert!(!collection.contains_key("I9").unwrap());
        assert!(collection.contains_key("I1").unwrap());
    }

    #[test]
    fn test_two_collections_interleave() {
        let (_dir, path) = seeded(&[
            ("I1", RecordType::Indi, "a"),
            ("I2", RecordType::Indi, "b"),
            ("F1", RecordType::Fam, "f1"),
            ("F2", RecordType::Fam, "f2"),
        ]);
        let indis = open(&path, RecordType::Indi);
        let fams = open(&path, RecordType::Fam);

        let mut seen = Vec::new();
        for item in indis {
            let (id, _) = item.unwrap();
            seen.push(id);
            assert_eq!(fams.get("F2").unwrap(), Some("f2".to_string()));
        }
        assert_eq!(seen, vec!["I1", "I2"]);
    }

    #[test]
    fn test_decode_failure_is_reported() {
        let (_dir, path) = seeded(&[("I1", RecordType::Indi, "a")]);
        let mut collection: LazyRecordCollection<u32> =
            LazyRecordCollection::open(&path, RecordType::Indi, ConnectionOptions::default()).unwrap();

        assert!(collection.has_next().unwrap());
        assert!(matches!(collection.next(), Some(Err(Error::Serialization(_)))));
        assert!(matches!(collection.get("I1"), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        RecordStore::open(&path).unwrap();

        let mut collection = open(&path, RecordType::Indi);
        assert!(collection.has_next().is_err());
        assert!(collection.get("I1").is_err());
    }
}
