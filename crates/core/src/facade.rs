//! Drop-in replacement for a bare parser.
//!
//! [`CachingFacade::parse`] checks the cache, refills it when needed and
//! hands back a [`ParsedGedcom`] whose accessors read lazily from the cache.
//! When the cache cannot be set up the source is parsed directly and the
//! same accessors serve the in-memory result instead.

use std::fs;
use std::path::{Path, PathBuf};

use gedcache_gedcom::{Gedcom, Parser, Record, RecordType, ZeroLevelParser};

use crate::Error;
use crate::cache::collection::LazyRecordCollection;
use crate::cache::connection::{self, Access, ConnectionOptions};
use crate::cache::filler::{CacheFiller, FillProgress};
use crate::cache::freshness::{CacheFacts, Freshness, classify};
use crate::cache::hash::cache_file_for;
use crate::cache::store::{self, RecordStore};
use crate::config::CacheConfig;

/// Parser front end that caches zero-level records between runs.
#[derive(Debug)]
pub struct CachingFacade<P = ZeroLevelParser> {
    parser: P,
    config: CacheConfig,
    cache_file: Option<PathBuf>,
    last_freshness: Option<Freshness>,
}

impl CachingFacade<ZeroLevelParser> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_parser(ZeroLevelParser, config)
    }
}

impl<P: Parser> CachingFacade<P> {
    pub fn with_parser(parser: P, config: CacheConfig) -> Self {
        Self { parser, config, cache_file: None, last_freshness: None }
    }

    /// Use one explicit cache file instead of a per-source file in `cache_dir`.
    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = Some(path.into());
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Classification made by the most recent `parse` or `open_cache`.
    ///
    /// `None` if that call did not use the cache.
    pub fn last_freshness(&self) -> Option<Freshness> {
        self.last_freshness
    }

    /// Cache file that `parse(source)` reads and writes.
    pub fn cache_path_for(&self, source: &Path) -> PathBuf {
        match &self.cache_file {
            Some(path) => path.clone(),
            None => cache_file_for(&self.config.cache_dir, source),
        }
    }

    /// Parse `source`, going through the cache when possible.
    pub fn parse(&mut self, source: impl AsRef<Path>) -> Result<ParsedGedcom, Error> {
        self.parse_with_heartbeat(source, |_| {})
    }

    /// Like [`parse`](Self::parse), reporting fill progress to `heartbeat`.
    ///
    /// Cache setup failures are logged and answered with an uncached parse.
    /// Only a failure to parse the source itself is returned.
    pub fn parse_with_heartbeat<F>(&mut self, source: impl AsRef<Path>, heartbeat: F) -> Result<ParsedGedcom, Error>
    where
        F: FnMut(&FillProgress),
    {
        let source = source.as_ref();
        self.last_freshness = None;

        if !self.config.enabled {
            return self.parse_live(source);
        }

        let cache_path = self.cache_path_for(source);
        match self.prepare(source, &cache_path, heartbeat) {
            Ok(freshness) => {
                self.last_freshness = Some(freshness);
                Ok(ParsedGedcom::Cached(CachedGedcom::new(cache_path, self.config.connection_options())))
            }
            Err(e) if !e.is_setup_failure() => Err(e),
            Err(e) => {
                tracing::warn!(cache = %cache_path.display(), error = %e, "cache unavailable; parsing without it");
                self.parse_live(source)
            }
        }
    }

    /// Open an existing cache without its source file.
    ///
    /// The source mtime is unknown, so only an absent, empty or unfilled
    /// cache is rejected; those yield `Ok(None)`.
    pub fn open_cache(&mut self, cache_path: impl AsRef<Path>) -> Result<Option<CachedGedcom>, Error> {
        let cache_path = cache_path.as_ref();
        let facts = CacheFacts::gather(cache_path, None)?;

        let cached = CachedGedcom::new(cache_path.to_path_buf(), self.config.connection_options());
        let rows = if facts.cache_is_empty() { 0 } else { cached.count_rows()? };
        let freshness = classify(&facts, rows);
        self.last_freshness = Some(freshness);

        Ok((freshness == Freshness::Fresh).then_some(cached))
    }

    fn prepare<F>(&self, source: &Path, cache_path: &Path, heartbeat: F) -> Result<Freshness, Error>
    where
        F: FnMut(&FillProgress),
    {
        if self.cache_file.is_none() {
            fs::create_dir_all(&self.config.cache_dir)
                .map_err(|source| Error::Io { path: self.config.cache_dir.clone(), source })?;
        }

        let facts = CacheFacts::gather(cache_path, Some(source))?;
        let mut store = RecordStore::open_with(cache_path, self.config.connection_options())?;

        let rows = if facts.cache_is_empty() {
            0
        } else {
            store.ensure_schema()?;
            store.count_rows()?
        };
        let freshness = classify(&facts, rows);
        tracing::debug!(cache = %cache_path.display(), ?freshness, rows, "classified cache");

        if freshness.needs_fill() {
            let filler = CacheFiller::new(&self.parser, self.config.heartbeat_every);
            filler.fill(source, &mut store, freshness == Freshness::NeedsClear, heartbeat)?;
        }

        Ok(freshness)
    }

    fn parse_live(&self, source: &Path) -> Result<ParsedGedcom, Error> {
        tracing::debug!(source = %source.display(), "parsing without cache");
        Ok(ParsedGedcom::Live(Box::new(self.parser.parse(source)?)))
    }
}

/// A filled cache file, read on demand.
#[derive(Debug, Clone)]
pub struct CachedGedcom {
    path: PathBuf,
    options: ConnectionOptions,
}

impl CachedGedcom {
    pub fn new(path: PathBuf, options: ConnectionOptions) -> Self {
        Self { path, options }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A fresh cursor over every record of `ty`, on its own connection.
    pub fn records(&self, ty: RecordType) -> Result<LazyRecordCollection<Record>, Error> {
        LazyRecordCollection::open(&self.path, ty, self.options)
    }

    /// The first record of `ty`, for HEAD and SUBN.
    pub fn singleton(&self, ty: RecordType) -> Result<Option<Record>, Error> {
        self.records(ty)?.first()
    }

    /// Rows in the cache file; zero if it was never filled.
    pub fn count_rows(&self) -> Result<u64, Error> {
        let conn = connection::open(&self.path, Access::Read, &self.options)?;
        store::count_filled_rows(&conn)
    }
}

/// Result of [`CachingFacade::parse`].
#[derive(Debug)]
pub enum ParsedGedcom {
    /// Served from the cache file.
    Cached(CachedGedcom),
    /// Parsed directly because no cache was usable.
    Live(Box<Gedcom>),
}

/// What a `getX` accessor resolves to.
#[derive(Debug)]
pub enum Accessed<'a> {
    /// HEAD and SUBN.
    Single(Option<Record>),
    Collection(Records<'a>),
}

impl ParsedGedcom {
    pub fn is_cached(&self) -> bool {
        matches!(self, ParsedGedcom::Cached(_))
    }

    /// Every record of `ty`.
    pub fn records(&self, ty: RecordType) -> Result<Records<'_>, Error> {
        match self {
            ParsedGedcom::Cached(cached) => Ok(Records::Cached(Box::new(cached.records(ty)?))),
            ParsedGedcom::Live(gedcom) => Ok(Records::Live(LiveRecords::new(gedcom.records(ty)))),
        }
    }

    /// The single record of `ty`, if present.
    pub fn singleton(&self, ty: RecordType) -> Result<Option<Record>, Error> {
        match self {
            ParsedGedcom::Cached(cached) => cached.singleton(ty),
            ParsedGedcom::Live(gedcom) => Ok(gedcom.singleton(ty).cloned()),
        }
    }

    /// Resolve an accessor name such as `getIndi` or `getHead`.
    ///
    /// Unknown names fail with [`Error::UnknownRecordType`].
    pub fn dispatch(&self, accessor: &str) -> Result<Accessed<'_>, Error> {
        let ty = RecordType::from_accessor(accessor)?;
        if ty.is_singleton() {
            Ok(Accessed::Single(self.singleton(ty)?))
        } else {
            Ok(Accessed::Collection(self.records(ty)?))
        }
    }

    pub fn head(&self) -> Result<Option<Record>, Error> {
        self.singleton(RecordType::Head)
    }

    pub fn subn(&self) -> Result<Option<Record>, Error> {
        self.singleton(RecordType::Subn)
    }

    pub fn subm(&self) -> Result<Records<'_>, Error> {
        self.records(RecordType::Subm)
    }

    pub fn sour(&self) -> Result<Records<'_>, Error> {
        self.records(RecordType::Sour)
    }

    pub fn indi(&self) -> Result<Records<'_>, Error> {
        self.records(RecordType::Indi)
    }

    pub fn fam(&self) -> Result<Records<'_>, Error> {
        self.records(RecordType::Fam)
    }

    pub fn note(&self) -> Result<Records<'_>, Error> {
        self.records(RecordType::Note)
    }

    pub fn repo(&self) -> Result<Records<'_>, Error> {
        self.records(RecordType::Repo)
    }

    pub fn obje(&self) -> Result<Records<'_>, Error> {
        self.records(RecordType::Obje)
    }
}

/// Records of one type, from the cache or from memory.
#[derive(Debug)]
pub enum Records<'a> {
    Cached(Box<LazyRecordCollection<Record>>),
    Live(LiveRecords<'a>),
}

impl Records<'_> {
    pub fn get(&self, id: &str) -> Result<Option<Record>, Error> {
        match self {
            Records::Cached(collection) => collection.get(id),
            Records::Live(live) => Ok(live.get(id).cloned()),
        }
    }

    pub fn contains_key(&self, id: &str) -> Result<bool, Error> {
        match self {
            Records::Cached(collection) => collection.contains_key(id),
            Records::Live(live) => Ok(live.get(id).is_some()),
        }
    }

    pub fn len(&self) -> Result<u64, Error> {
        match self {
            Records::Cached(collection) => collection.len(),
            Records::Live(live) => Ok(live.records.len() as u64),
        }
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    pub fn restart(&mut self) {
        match self {
            Records::Cached(collection) => collection.restart(),
            Records::Live(live) => live.position = 0,
        }
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Records::Cached(collection) => collection.next().map(|item| item.map(|(_, record)| record)),
            Records::Live(live) => live.next().map(|record| Ok(record.clone())),
        }
    }
}

/// Cursor over records that were parsed without the cache.
#[derive(Debug, Clone)]
pub struct LiveRecords<'a> {
    records: &'a [Record],
    position: usize,
}

impl<'a> LiveRecords<'a> {
    fn new(records: &'a [Record]) -> Self {
        Self { records, position: 0 }
    }

    fn get(&self, id: &str) -> Option<&'a Record> {
        self.records.iter().find(|record| record.natural_id() == Some(id))
    }
}

impl<'a> Iterator for LiveRecords<'a> {
    type Item = &'a Record;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.get(self.position)?;
        self.position += 1;
        Some(record)
    }
}
