//! Parser error types.

use std::path::PathBuf;

/// Errors raised while reading a GEDCOM file.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The source file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line did not follow the `level [@xref@] tag [value]` shape.
    #[error("malformed line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// A tag or accessor name outside the cacheable record types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown record type: {0}")]
pub struct UnknownRecordType(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display() {
        let err = ParseError::Malformed { line: 7, reason: "missing tag".into() };
        assert_eq!(err.to_string(), "malformed line 7: missing tag");
    }

    #[test]
    fn test_unknown_type_display() {
        let err = UnknownRecordType("XYZ".into());
        assert!(err.to_string().contains("XYZ"));
    }
}
