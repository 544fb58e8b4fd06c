//! Database connection management with pragma configuration.
//!
//! Every connection the cache opens goes through here: the single writer
//! owned by a [`RecordStore`](super::store::RecordStore) and the reader
//! owned by each [`LazyRecordCollection`](super::collection::LazyRecordCollection).

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use crate::Error;

/// Settings applied to every cache connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub busy_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self { busy_timeout: Duration::from_millis(1_500) }
    }
}

/// How a connection is going to be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    /// Creates the file if missing; used by the store.
    Write,
    /// Never creates the file and refuses writes at the SQL level.
    Read,
}

/// Open a connection at `path` and apply the cache pragmas.
///
/// Any failure here, including the file not being a database, is reported
/// as [`Error::ConnectFailed`].
pub(crate) fn open(path: &Path, access: Access, options: &ConnectionOptions) -> Result<Connection, Error> {
    let flags = match access {
        Access::Write => OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        Access::Read => OpenFlags::SQLITE_OPEN_READ_WRITE,
    } | OpenFlags::SQLITE_OPEN_NO_MUTEX
        | OpenFlags::SQLITE_OPEN_URI;

    let connect_failed = |source| Error::ConnectFailed { path: path.to_path_buf(), source };

    let conn = Connection::open_with_flags(path, flags).map_err(connect_failed)?;
    conn.busy_timeout(options.busy_timeout).map_err(connect_failed)?;
    apply_pragmas(&conn, access).map_err(connect_failed)?;

    tracing::debug!(path = %path.display(), ?access, "opened cache connection");
    Ok(conn)
}

/// Open an in-memory database with the writer pragmas, for tests.
pub(crate) fn open_in_memory(options: &ConnectionOptions) -> Result<Connection, Error> {
    let connect_failed = |source| Error::ConnectFailed { path: ":memory:".into(), source };

    let conn = Connection::open_in_memory().map_err(connect_failed)?;
    conn.busy_timeout(options.busy_timeout).map_err(connect_failed)?;
    apply_pragmas(&conn, Access::Write).map_err(connect_failed)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection, access: Access) -> rusqlite::Result<()> {
    match access {
        Access::Write => conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;",
        ),
        Access::Read => conn.execute_batch(
            "PRAGMA query_only=ON;
             PRAGMA temp_store=MEMORY;",
        ),
    }
}
