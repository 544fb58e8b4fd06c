//! Writing a parsed file into the cache.
//!
//! A fill parses the source once, then creates the schema, optionally clears
//! old rows and inserts every zero-level record inside one transaction. Any
//! failure rolls the whole thing back.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use gedcache_gedcom::{Gedcom, Parser, RecordType};

use super::store::{CacheRecord, RecordStore};
use crate::Error;

/// Progress reported to the heartbeat callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillProgress {
    /// Records written so far.
    pub written: usize,
    /// Total records the fill will write.
    pub total: usize,
    /// Type of the record written last.
    pub record_type: RecordType,
}

/// Summary of a finished fill.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillStats {
    pub per_type: BTreeMap<RecordType, usize>,
    pub total: usize,
    /// Rows removed before filling.
    pub cleared: usize,
    /// Zero-level records that were not cached.
    pub unhandled: usize,
    pub duration_ms: u64,
}

/// Drives a parser and writes its output through a [`RecordStore`].
#[derive(Debug, Clone, Copy)]
pub struct CacheFiller<P> {
    parser: P,
    heartbeat_every: usize,
}

impl<P: Parser> CacheFiller<P> {
    pub fn new(parser: P, heartbeat_every: usize) -> Self {
        Self { parser, heartbeat_every: heartbeat_every.max(1) }
    }

    /// Parse `source` and write it into `store`.
    ///
    /// Parsing happens before the transaction opens, so a parse failure
    /// leaves the store untouched.
    pub fn fill<F>(
        &self, source: &Path, store: &mut RecordStore, clear_first: bool, heartbeat: F,
    ) -> Result<FillStats, Error>
    where
        F: FnMut(&FillProgress),
    {
        let gedcom = self.parser.parse(source)?;
        self.fill_from(&gedcom, store, clear_first, heartbeat)
    }

    /// Write an already-parsed model into `store` in one transaction.
    pub fn fill_from<F>(
        &self, gedcom: &Gedcom, store: &mut RecordStore, clear_first: bool, mut heartbeat: F,
    ) -> Result<FillStats, Error>
    where
        F: FnMut(&FillProgress),
    {
        let start = Instant::now();
        let mut stats = FillStats::default();
        let total = gedcom.len();

        let tx = store.transaction()?;
        tx.ensure_schema()?;
        if clear_first {
            stats.cleared = tx.clear()?;
        }

        for ty in RecordType::ALL {
            for record in gedcom.records(ty) {
                let row = CacheRecord::encode(record.natural_id(), ty, record)?;
                tx.insert(&row)?;

                stats.total += 1;
                *stats.per_type.entry(ty).or_default() += 1;
                if stats.total % self.heartbeat_every == 0 {
                    heartbeat(&FillProgress { written: stats.total, total, record_type: ty });
                }
            }
        }

        for record in &gedcom.unhandled {
            tracing::warn!(tag = %record.tag, xref = ?record.xref, "record type not cached");
        }
        stats.unhandled = gedcom.unhandled.len();

        tx.commit()?;

        let last_type = stats.per_type.keys().next_back().copied();
        if let Some(last) = last_type.filter(|_| stats.total % self.heartbeat_every != 0) {
            heartbeat(&FillProgress { written: stats.total, total, record_type: last });
        }
        stats.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            path = %store.path().display(),
            records = stats.total,
            cleared = stats.cleared,
            unhandled = stats.unhandled,
            duration_ms = stats.duration_ms,
            "filled cache"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gedcache_gedcom::{ParseError, Record, ZeroLevelParser};

    fn model(indis: &[&str], fams: &[&str]) -> Gedcom {
        let mut gedcom = Gedcom::default();
        gedcom.push(RecordType::Head, Record::new(None, "HEAD", None));
        gedcom.push(RecordType::Subn, Record::new(None, "SUBN", None));
        for id in indis {
            gedcom.push(RecordType::Indi, Record::new(Some(id.to_string()), "INDI", None));
        }
        for id in fams {
            gedcom.push(RecordType::Fam, Record::new(Some(id.to_string()), "FAM", None));
        }
        gedcom
    }

    fn store() -> RecordStore {
        RecordStore::open_in_memory().unwrap()
    }

    struct FailingParser;

    impl Parser for FailingParser {
        fn parse(&self, _path: &Path) -> Result<Gedcom, ParseError> {
            Err(ParseError::Malformed { line: 1, reason: "broken".into() })
        }
    }

    #[test]
    fn test_fill_writes_every_type() {
        let mut store = store();
        let filler = CacheFiller::new(ZeroLevelParser, 100);

        let stats = filler.fill_from(&model(&["I1", "I2"], &["F1"]), &mut store, false, |_| {}).unwrap();

        assert_eq!(stats.total, 5);
        assert_eq!(stats.per_type[&RecordType::Indi], 2);
        assert_eq!(stats.per_type[&RecordType::Head], 1);
        assert_eq!(store.count_rows().unwrap(), 5);
        assert_eq!(store.count_type(RecordType::Subn).unwrap(), 1);
    }

    #[test]
    fn test_fill_creates_schema() {
        let mut store = store();
        assert!(store.count_rows().is_err());

        CacheFiller::new(ZeroLevelParser, 100).fill_from(&Gedcom::default(), &mut store, false, |_| {}).unwrap();
        assert_eq!(store.count_rows().unwrap(), 0);
    }

    #[test]
    fn test_fill_clears_first() {
        let mut store = store();
        let filler = CacheFiller::new(ZeroLevelParser, 100);
        filler.fill_from(&model(&["I1", "I2", "I3"], &[]), &mut store, false, |_| {}).unwrap();

        let stats = filler.fill_from(&model(&["I1"], &[]), &mut store, true, |_| {}).unwrap();
        assert_eq!(stats.cleared, 5);
        assert_eq!(store.count_type(RecordType::Indi).unwrap(), 1);
    }

    #[test]
    fn test_failed_fill_rolls_back() {
        let mut store = store();
        let filler = CacheFiller::new(ZeroLevelParser, 100);
        filler.fill_from(&model(&["I1", "I2"], &[]), &mut store, false, |_| {}).unwrap();
        let before = store.count_rows().unwrap();

        // The duplicate INDI fails on the fourth insert of the refill.
        let err = filler.fill_from(&model(&["I7", "I7"], &["F1"]), &mut store, true, |_| {}).unwrap_err();

        assert!(err.is_duplicate_key());
        assert_eq!(store.count_rows().unwrap(), before);
        assert_eq!(store.count_type(RecordType::Indi).unwrap(), 2);
    }

    #[test]
    fn test_failed_first_fill_leaves_nothing() {
        let mut store = store();
        let filler = CacheFiller::new(ZeroLevelParser, 100);

        assert!(filler.fill_from(&model(&["I1", "I1"], &[]), &mut store, false, |_| {}).is_err());
        assert!(store.count_rows().is_err());
    }

    #[test]
    fn test_parse_failure_leaves_store_untouched() {
        let mut store = store();
        CacheFiller::new(ZeroLevelParser, 100).fill_from(&model(&["I1"], &[]), &mut store, false, |_| {}).unwrap();

        let err = CacheFiller::new(FailingParser, 100)
            .fill(Path::new("family.ged"), &mut store, true, |_| {})
            .unwrap_err();

        assert!(matches!(err, Error::ParseFailed(_)));
        assert_eq!(store.count_rows().unwrap(), 3);
    }

    #[test]
    fn test_heartbeat_cadence() {
        let mut store = store();
        let filler = CacheFiller::new(ZeroLevelParser, 2);
        let mut beats = Vec::new();

        filler.fill_from(&model(&["I1", "I2", "I3"], &[]), &mut store, false, |p| beats.push(p.written)).unwrap();

        // Every second record, then once for the remainder.
        assert_eq!(beats, vec![2, 4, 5]);
    }

    #[test]
    fn test_unhandled_counted() {
        let mut store = store();
        let mut gedcom = model(&["I1"], &[]);
        gedcom.unhandled.push(Record::new(Some("X1".into()), "_CUSTOM", None));

        let stats = CacheFiller::new(ZeroLevelParser, 100).fill_from(&gedcom, &mut store, false, |_| {}).unwrap();
        assert_eq!(stats.unhandled, 1);
        assert_eq!(store.count_rows().unwrap(), 3);
    }
}
