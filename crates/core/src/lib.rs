//! Persistent cache in front of a GEDCOM parser.
//!
//! This crate provides:
//! - A SQLite record store keyed by record id
//! - Lazy, type-scoped record collections read straight from the cache
//! - An mtime-based freshness policy and a transactional cache filler
//! - [`CachingFacade`], which falls back to plain parsing when caching fails
//! - Layered configuration and unified error types

pub mod cache;
pub mod config;
pub mod error;
pub mod facade;

pub use cache::{CacheFiller, FillProgress, FillStats, Freshness, LazyRecordCollection, RecordStore};
pub use config::{CacheConfig, ConfigError};
pub use error::Error;
pub use facade::{Accessed, CachedGedcom, CachingFacade, ParsedGedcom, Records};
pub use gedcache_gedcom::{Gedcom, ParseError, Parser, Record, RecordType, ZeroLevelParser};
