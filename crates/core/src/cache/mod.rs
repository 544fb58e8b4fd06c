//! SQLite-backed cache of parsed zero-level records.
//!
//! - [`RecordStore`] owns the writer connection and the single `cache` table
//! - [`LazyRecordCollection`] reads one record type through its own connection
//! - [`classify`] decides whether a cache file can be used as-is
//! - [`CacheFiller`] parses a source and rewrites the cache in one transaction
//! - WAL mode so readers and the writer do not block each other

pub mod collection;
pub mod connection;
pub mod filler;
pub mod freshness;
pub mod hash;
pub mod store;

pub use crate::Error;

pub use collection::LazyRecordCollection;
pub use connection::ConnectionOptions;
pub use filler::{CacheFiller, FillProgress, FillStats};
pub use freshness::{CacheFacts, FileStamp, Freshness, classify};
pub use hash::{cache_file_for, generate_record_id};
pub use store::{CacheRecord, RecordStore, StoreTransaction};
