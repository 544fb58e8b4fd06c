//! Zero-level records and their type tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownRecordType;

/// The zero-level record types the cache knows how to store.
///
/// The set is closed: anything else found in a file is reported as
/// unhandled by the parser rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordType {
    Head,
    Subn,
    Subm,
    Sour,
    Indi,
    Fam,
    Note,
    Repo,
    Obje,
}

impl RecordType {
    /// Every record type, in the order a fill writes them.
    pub const ALL: [RecordType; 9] = [
        RecordType::Head,
        RecordType::Subn,
        RecordType::Subm,
        RecordType::Sour,
        RecordType::Indi,
        RecordType::Fam,
        RecordType::Note,
        RecordType::Repo,
        RecordType::Obje,
    ];

    /// Tag stored in the cache's `type` column.
    pub fn tag(self) -> &'static str {
        match self {
            RecordType::Head => "HEAD",
            RecordType::Subn => "SUBN",
            RecordType::Subm => "SUBM",
            RecordType::Sour => "SOUR",
            RecordType::Indi => "INDI",
            RecordType::Fam => "FAM",
            RecordType::Note => "NOTE",
            RecordType::Repo => "REPO",
            RecordType::Obje => "OBJE",
        }
    }

    /// HEAD and SUBN appear at most once per file and are served as a
    /// single record instead of a collection.
    pub fn is_singleton(self) -> bool {
        matches!(self, RecordType::Head | RecordType::Subn)
    }

    /// Resolve an accessor name such as `getIndi` to its record type.
    ///
    /// The `get` prefix is required; the remainder is matched case-insensitively.
    pub fn from_accessor(name: &str) -> Result<Self, UnknownRecordType> {
        name.strip_prefix("get")
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| UnknownRecordType(name.to_string()))?
            .parse()
            .map_err(|_| UnknownRecordType(name.to_string()))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for RecordType {
    type Err = UnknownRecordType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        RecordType::ALL
            .into_iter()
            .find(|ty| ty.tag() == upper)
            .ok_or_else(|| UnknownRecordType(s.to_string()))
    }
}

/// One nested line of a zero-level record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub level: u8,
    pub xref: Option<String>,
    pub tag: String,
    pub value: Option<String>,
}

/// A zero-level record together with every line nested beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Cross-reference id without the surrounding `@` characters.
    pub xref: Option<String>,
    pub tag: String,
    pub value: Option<String>,
    pub lines: Vec<Line>,
}

impl Record {
    pub fn new(xref: Option<String>, tag: impl Into<String>, value: Option<String>) -> Self {
        Self { xref, tag: tag.into(), value, lines: Vec::new() }
    }

    /// The record's own identifier, if the file gave it one.
    pub fn natural_id(&self) -> Option<&str> {
        self.xref.as_deref()
    }

    /// Value of the first direct child line with `tag`.
    pub fn child_value(&self, tag: &str) -> Option<&str> {
        self.lines.iter().find(|line| line.level == 1 && line.tag == tag).and_then(|line| line.value.as_deref())
    }
}
