//! Zero-level GEDCOM parsing.
//!
//! The cache only needs a file split into its top-level records, so this
//! parser stops at that granularity:
//!
//! - Each line is read as `level [@xref@] tag [value]`.
//! - A level-0 line opens a record; deeper lines are attached to it verbatim.
//! - `TRLR` ends the file. Unknown zero-level tags are kept as unhandled.

use std::path::Path;

use crate::error::ParseError;
use crate::model::Gedcom;
use crate::record::{Line, Record, RecordType};

/// Source of parsed GEDCOM models.
///
/// The cache drives whatever implementation it is given exactly once per fill.
pub trait Parser {
    /// Parse the file at `path` into its zero-level records.
    fn parse(&self, path: &Path) -> Result<Gedcom, ParseError>;
}

impl<P: Parser + ?Sized> Parser for &P {
    fn parse(&self, path: &Path) -> Result<Gedcom, ParseError> {
        (**self).parse(path)
    }
}

/// Line-based parser that keeps nested lines uninterpreted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroLevelParser;

impl ZeroLevelParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse GEDCOM text that is already in memory.
    pub fn parse_str(&self, input: &str) -> Result<Gedcom, ParseError> {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        let mut gedcom = Gedcom::default();
        let mut current: Option<Record> = None;
        let mut previous_level: Option<u8> = None;

        for (index, raw) in input.lines().enumerate() {
            let number = index + 1;
            if raw.trim().is_empty() {
                continue;
            }

            let line = parse_line(number, raw)?;
            match previous_level {
                None if line.level != 0 => {
                    return Err(ParseError::Malformed { line: number, reason: "file must start at level 0".into() });
                }
                Some(prev) if line.level > prev.saturating_add(1) => {
                    return Err(ParseError::Malformed {
                        line: number,
                        reason: format!("level jumps from {prev} to {}", line.level),
                    });
                }
                _ => {}
            }
            previous_level = Some(line.level);

            if line.level > 0 {
                if let Some(record) = current.as_mut() {
                    record.lines.push(line);
                }
                continue;
            }

            if let Some(record) = current.take() {
                route(&mut gedcom, record);
            }

            if line.tag == "TRLR" {
                break;
            }

            current = Some(Record::new(line.xref, line.tag, line.value));
        }

        if let Some(record) = current.take() {
            route(&mut gedcom, record);
        }

        tracing::debug!(records = gedcom.len(), unhandled = gedcom.unhandled.len(), "parsed GEDCOM");
        Ok(gedcom)
    }
}

impl Parser for ZeroLevelParser {
    fn parse(&self, path: &Path) -> Result<Gedcom, ParseError> {
        let bytes = std::fs::read(path).map_err(|source| ParseError::Io { path: path.to_path_buf(), source })?;
        self.parse_str(&decode(path, bytes))
    }
}

/// UTF-8 text of a source file. Invalid sequences (ANSEL or Latin-1 files)
/// become U+FFFD and are reported.
fn decode(path: &Path, bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                valid_up_to = e.utf8_error().valid_up_to(),
                "source is not valid UTF-8; invalid bytes replaced"
            );
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

fn route(gedcom: &mut Gedcom, record: Record) {
    match record.tag.parse::<RecordType>() {
        Ok(ty) => gedcom.push(ty, record),
        Err(_) => {
            tracing::warn!(tag = %record.tag, xref = ?record.xref, "unhandled zero-level record");
            gedcom.unhandled.push(record);
        }
    }
}

fn parse_line(number: usize, raw: &str) -> Result<Line, ParseError> {
    let malformed = |reason: &str| ParseError::Malformed { line: number, reason: reason.to_string() };

    let trimmed = raw.trim_start();
    let (level, rest) = trimmed.split_once(' ').ok_or_else(|| malformed("missing tag"))?;
    let level: u8 = level.parse().map_err(|_| malformed("level is not a number"))?;
    let rest = rest.trim_start();

    let (xref, rest) = if rest.starts_with('@') {
        let (token, rest) = rest.split_once(' ').ok_or_else(|| malformed("missing tag after xref"))?;
        let id = token
            .strip_prefix('@')
            .and_then(|t| t.strip_suffix('@'))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| malformed("xref must look like @ID@"))?;
        (Some(id.to_string()), rest.trim_start())
    } else {
        (None, rest)
    };

    let (tag, value) = match rest.split_once(' ') {
        Some((tag, value)) => (tag, Some(value.to_string())),
        None => (rest, None),
    };
    if tag.is_empty() {
        return Err(malformed("missing tag"));
    }

    Ok(Line { level, xref, tag: tag.to_string(), value })
}
