//! In-memory result of parsing one GEDCOM file.

use serde::{Deserialize, Serialize};

use crate::record::{Record, RecordType};

/// Every zero-level record of a file, grouped by type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gedcom {
    pub head: Option<Record>,
    pub subn: Vec<Record>,
    pub subm: Vec<Record>,
    pub sour: Vec<Record>,
    pub indi: Vec<Record>,
    pub fam: Vec<Record>,
    pub note: Vec<Record>,
    pub repo: Vec<Record>,
    pub obje: Vec<Record>,

    /// Zero-level records whose tag is outside [`RecordType`].
    pub unhandled: Vec<Record>,
}

impl Gedcom {
    /// Records of one type. HEAD yields at most one element.
    pub fn records(&self, ty: RecordType) -> &[Record] {
        match ty {
            RecordType::Head => self.head.as_slice(),
            RecordType::Subn => &self.subn,
            RecordType::Subm => &self.subm,
            RecordType::Sour => &self.sour,
            RecordType::Indi => &self.indi,
            RecordType::Fam => &self.fam,
            RecordType::Note => &self.note,
            RecordType::Repo => &self.repo,
            RecordType::Obje => &self.obje,
        }
    }

    /// First record of a singleton type.
    pub fn singleton(&self, ty: RecordType) -> Option<&Record> {
        self.records(ty).first()
    }

    /// Look up a record of `ty` by its natural identifier.
    pub fn find(&self, ty: RecordType, id: &str) -> Option<&Record> {
        self.records(ty).iter().find(|record| record.natural_id() == Some(id))
    }

    /// Add a record under `ty`.
    ///
    /// A second HEAD is kept in `unhandled` so it is still visible.
    pub fn push(&mut self, ty: RecordType, record: Record) {
        match ty {
            RecordType::Head if self.head.is_some() => {
                tracing::warn!("duplicate HEAD record; keeping the first");
                self.unhandled.push(record);
            }
            RecordType::Head => self.head = Some(record),
            RecordType::Subn => self.subn.push(record),
            RecordType::Subm => self.subm.push(record),
            RecordType::Sour => self.sour.push(record),
            RecordType::Indi => self.indi.push(record),
            RecordType::Fam => self.fam.push(record),
            RecordType::Note => self.note.push(record),
            RecordType::Repo => self.repo.push(record),
            RecordType::Obje => self.obje.push(record),
        }
    }

    /// Number of cacheable records across all types.
    pub fn len(&self) -> usize {
        RecordType::ALL.into_iter().map(|ty| self.records(ty).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
