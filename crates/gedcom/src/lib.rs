//! GEDCOM model and zero-level parser for gedcache.
//!
//! This crate provides:
//! - The record model handed to the cache (`Gedcom`, `Record`, `Line`)
//! - The closed set of cacheable record types (`RecordType`)
//! - A `Parser` trait and a shallow line-based implementation

pub mod error;
pub mod model;
pub mod parser;
pub mod record;

pub use error::{ParseError, UnknownRecordType};
pub use model::Gedcom;
pub use parser::{Parser, ZeroLevelParser};
pub use record::{Line, Record, RecordType};
