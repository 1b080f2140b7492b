//! Identifier-keyed record store for one record tag

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use esmkit_formats::{FormId, Record, Tag};

/// Result of [`RecordStore::insert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// No record with this identifier was stored
    Added,
    /// An existing record was overwritten
    Replaced,
    /// An equal record was already stored and was kept
    Unchanged,
    /// The record carried identifier zero and was dropped
    Ignored,
}

/// Records of a single tag, ordered by identifier
///
/// Later inserts with the same identifier win, which is how a plugin
/// overrides a master's record. With equality-before-replace enabled an
/// insert whose content matches the stored record leaves the store as is.
#[derive(Debug, Clone)]
pub struct RecordStore {
    tag: Tag,
    records: BTreeMap<FormId, Record>,
    dedupe_equal: bool,
}

impl RecordStore {
    /// Empty store for records tagged `tag`
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            records: BTreeMap::new(),
            dedupe_equal: false,
        }
    }

    /// Enable or disable equality-before-replace
    #[must_use]
    pub fn with_dedupe_equal(mut self, enable: bool) -> Self {
        self.dedupe_equal = enable;
        self
    }

    /// Tag this store holds
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Store `record`, replacing any record with the same identifier
    pub fn insert(&mut self, record: Record) -> InsertOutcome {
        let id = record.form_id();
        if id.is_null() {
            return InsertOutcome::Ignored;
        }
        match self.records.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                InsertOutcome::Added
            }
            Entry::Occupied(mut slot) => {
                if self.dedupe_equal && slot.get().same_content(&record) {
                    InsertOutcome::Unchanged
                } else {
                    slot.insert(record);
                    InsertOutcome::Replaced
                }
            }
        }
    }

    /// Store `record`; returns whether it was kept
    pub fn add(&mut self, record: Record) -> bool {
        !matches!(self.insert(record), InsertOutcome::Ignored)
    }

    /// Whether a record with `id` is stored
    pub fn has(&self, id: FormId) -> bool {
        self.records.contains_key(&id)
    }

    /// Record with `id`
    pub fn get(&self, id: FormId) -> Option<&Record> {
        self.records.get(&id)
    }

    /// Mutable record with `id`
    pub fn get_mut(&mut self, id: FormId) -> Option<&mut Record> {
        self.records.get_mut(&id)
    }

    /// Remove and return the record with `id`
    pub fn remove(&mut self, id: FormId) -> Option<Record> {
        self.records.remove(&id)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in identifier order
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Identifiers in order
    pub fn ids(&self) -> impl Iterator<Item = FormId> + '_ {
        self.records.keys().copied()
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl<'a> IntoIterator for &'a RecordStore {
    type Item = &'a Record;
    type IntoIter = std::collections::btree_map::Values<'a, FormId, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values()
    }
}
