//! Unified error types for gedcache.
//!
//! Setup failures (connect, schema, fill) make the facade fall back to
//! uncached parsing. Read-path failures are always surfaced; a lookup miss
//! is `Ok(None)`, never an error.

use std::path::PathBuf;

use gedcache_gedcom::{ParseError, UnknownRecordType};
use rusqlite::ErrorCode;

/// Unified error types for the cache subsystem.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The cache file could not be opened or created.
    #[error("CONNECT_FAILED: {}: {source}", path.display())]
    ConnectFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Creating the cache table or its indexes failed.
    #[error("SCHEMA_FAILED: {0}")]
    SchemaFailed(#[source] rusqlite::Error),

    /// Inserting a record failed, including duplicate keys.
    #[error("WRITE_FAILED: {id}: {source}")]
    WriteFailed {
        id: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The source GEDCOM file could not be parsed.
    #[error("PARSE_FAILED: {0}")]
    ParseFailed(#[from] ParseError),

    /// Any other database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(#[from] rusqlite::Error),

    /// A payload could not be encoded or decoded.
    #[error("CACHE_ERROR: payload serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A tag or accessor name is not a cacheable record type.
    #[error("UNKNOWN_TYPE: {0}")]
    UnknownRecordType(#[from] UnknownRecordType),

    /// Reading filesystem metadata failed.
    #[error("IO_ERROR: {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Whether a write failed because the key already exists.
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            Error::WriteFailed { source: rusqlite::Error::SqliteFailure(err, _), .. } => {
                err.code == ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }

    /// Whether this error belongs to cache setup, where falling back to a
    /// live parse is the right response.
    pub fn is_setup_failure(&self) -> bool {
        !matches!(self, Error::ParseFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownRecordType(UnknownRecordType("XYZ".to_string()));
        assert!(err.to_string().contains("UNKNOWN_TYPE"));
        assert!(err.to_string().contains("XYZ"));
    }

    #[test]
    fn test_parse_failed_is_not_setup() {
        let err = Error::ParseFailed(ParseError::Malformed { line: 1, reason: "x".into() });
        assert!(!err.is_setup_failure());
        assert!(err.to_string().starts_with("PARSE_FAILED"));
    }

    #[test]
    fn test_schema_failed_is_setup() {
        let err = Error::SchemaFailed(rusqlite::Error::InvalidQuery);
        assert!(err.is_setup_failure());
        assert!(!err.is_duplicate_key());
    }
}
