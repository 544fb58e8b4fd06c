//! Cache invalidation policy.
//!
//! [`classify`] is a pure decision over filesystem facts gathered up front by
//! [`CacheFacts::gather`]. Modification times that cannot be read never
//! invalidate a cache: the comparison fails open and is logged.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::Error;

/// What has to happen before a cache can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Populated and at least as new as its source.
    Fresh,
    /// Missing or zero-length; schema and rows must be written.
    NeedsCreate,
    /// Older than its source; rows must be deleted and rewritten.
    NeedsClear,
    /// Schema present but no rows.
    NeedsFill,
}

impl Freshness {
    pub fn needs_fill(self) -> bool {
        !matches!(self, Freshness::Fresh)
    }
}

/// Size and modification time of an existing cache file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// Filesystem facts the policy decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheFacts {
    /// `None` when the cache file does not exist.
    pub cache: Option<FileStamp>,
    /// `None` when there is no source or its mtime cannot be read.
    pub source_modified: Option<SystemTime>,
}

impl CacheFacts {
    /// Stat the cache file and, if given, the source file.
    ///
    /// A missing cache is a fact, not an error. Any other failure to stat
    /// the cache is returned. Source problems are logged and recorded as an
    /// unknown mtime.
    pub fn gather(cache_path: &Path, source_path: Option<&Path>) -> Result<Self, Error> {
        let cache = match fs::metadata(cache_path) {
            Ok(meta) => {
                let modified = newest(meta.modified().ok(), wal_modified(cache_path));
                Some(FileStamp { len: meta.len(), modified })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(source) => return Err(Error::Io { path: cache_path.to_path_buf(), source }),
        };

        let source_modified = source_path.and_then(|path| match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => Some(modified),
            Err(e) => {
                tracing::warn!(source = %path.display(), error = %e, "cannot read source mtime");
                None
            }
        });

        Ok(Self { cache, source_modified })
    }

    /// Whether the cache file is absent or zero-length.
    pub fn cache_is_empty(&self) -> bool {
        self.cache.is_none_or(|stamp| stamp.len == 0)
    }
}

/// Classify a cache from its facts and current row count.
///
/// `row_count` is only consulted when the file exists, is non-empty and
/// is not older than its source.
pub fn classify(facts: &CacheFacts, row_count: u64) -> Freshness {
    let stamp = match facts.cache {
        None => return Freshness::NeedsCreate,
        Some(stamp) if stamp.len == 0 => return Freshness::NeedsCreate,
        Some(stamp) => stamp,
    };

    match (stamp.modified, facts.source_modified) {
        (Some(cache), Some(source)) if cache < source => {
            tracing::debug!(cache = %rfc3339(cache), source = %rfc3339(source), "cache older than source");
            return Freshness::NeedsClear;
        }
        (Some(_), Some(_)) => {}
        (None, _) => tracing::warn!("cache mtime unavailable; treating cache as current"),
        (_, None) => tracing::debug!("source mtime unknown; treating cache as current"),
    }

    if row_count > 0 { Freshness::Fresh } else { Freshness::NeedsFill }
}

/// A WAL-mode database can hold committed pages in its `-wal` file before
/// they reach the main file.
fn wal_modified(cache_path: &Path) -> Option<SystemTime> {
    let mut wal = cache_path.as_os_str().to_owned();
    wal.push("-wal");
    fs::metadata(PathBuf::from(wal)).and_then(|m| m.modified()).ok()
}

fn newest(a: Option<SystemTime>, b: Option<SystemTime>) -> Option<SystemTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}
