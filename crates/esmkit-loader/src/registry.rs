//! All record stores of a run, one per tag
//!
//! A [`Registry`] is owned by whoever drives the run and passed by
//! reference to the reader and the writer. Independent runs, including
//! tests running in parallel, each get their own.

use std::collections::{BTreeMap, HashMap};

use esmkit_formats::{FormId, Group, GroupHeader, Record, Tag};

use crate::store::{InsertOutcome, RecordStore};

/// Per-tag record stores plus the ownership of child records
#[derive(Debug, Clone, Default)]
pub struct Registry {
    stores: BTreeMap<Tag, RecordStore>,
    /// Child record identifier to the entity owning its group
    owners: HashMap<FormId, FormId>,
    dedupe_equal: bool,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable equality-before-replace for every store
    #[must_use]
    pub fn with_dedupe_equal(mut self, enable: bool) -> Self {
        self.dedupe_equal = enable;
        self
    }

    /// Store `record` in the store for its tag
    pub fn insert(&mut self, record: Record) -> InsertOutcome {
        self.store_mut(record.tag()).insert(record)
    }

    /// Store for `tag`, if any record of that tag was ever inserted
    pub fn store(&self, tag: Tag) -> Option<&RecordStore> {
        self.stores.get(&tag)
    }

    /// Store for `tag`, created empty if missing
    pub fn store_mut(&mut self, tag: Tag) -> &mut RecordStore {
        let dedupe = self.dedupe_equal;
        self.stores
            .entry(tag)
            .or_insert_with(|| RecordStore::new(tag).with_dedupe_equal(dedupe))
    }

    /// Record tagged `tag` with identifier `id`
    pub fn get(&self, tag: Tag, id: FormId) -> Option<&Record> {
        self.stores.get(&tag)?.get(id)
    }

    /// Record with identifier `id` in any store
    pub fn find(&self, id: FormId) -> Option<&Record> {
        self.stores.values().find_map(|store| store.get(id))
    }

    /// Remove the record with identifier `id` from every store
    ///
    /// Returns whether anything was removed.
    pub fn remove(&mut self, id: FormId) -> bool {
        let mut removed = false;
        for store in self.stores.values_mut() {
            removed |= store.remove(id).is_some();
        }
        self.owners.remove(&id);
        removed
    }

    /// Record that `child` lives in a group owned by `owner`
    pub fn set_owner(&mut self, child: FormId, owner: FormId) {
        self.owners.insert(child, owner);
    }

    /// Entity owning the group `child` was read from
    pub fn owner(&self, child: FormId) -> Option<FormId> {
        self.owners.get(&child).copied()
    }

    /// Identifiers of records owned by `owner`, in identifier order
    pub fn children_of(&self, owner: FormId) -> Vec<FormId> {
        let mut children: Vec<FormId> = self
            .owners
            .iter()
            .filter(|&(_, &o)| o == owner)
            .map(|(&child, _)| child)
            .collect();
        children.sort_unstable();
        children
    }

    /// Tags with a store, in tag order
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.stores.keys().copied()
    }

    /// Record count per tag, skipping empty stores
    pub fn counts(&self) -> Vec<(Tag, usize)> {
        self.stores
            .iter()
            .filter(|(_, store)| !store.is_empty())
            .map(|(&tag, store)| (tag, store.len()))
            .collect()
    }

    /// Records across all stores
    pub fn record_count(&self) -> usize {
        self.stores.values().map(RecordStore::len).sum()
    }

    /// Whether no store holds a record
    pub fn is_empty(&self) -> bool {
        self.stores.values().all(RecordStore::is_empty)
    }

    /// Drop every record and ownership entry
    pub fn clear(&mut self) {
        self.stores.clear();
        self.owners.clear();
    }

    /// One top-level group per non-empty store, ordered by tag
    ///
    /// Records inside a group are ordered by identifier. Sizes are left for
    /// the writer to compute.
    pub fn to_groups(&self) -> Vec<Group> {
        self.stores
            .iter()
            .filter(|(_, store)| !store.is_empty())
            .map(|(&tag, store)| {
                let mut group = Group::new(GroupHeader::top_level(tag));
                for record in store {
                    group.add_record(record.clone());
                }
                group
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use esmkit_formats::RecordHeader;
    use pretty_assertions::assert_eq;

    fn record(tag: &[u8; 4], id: u32) -> Record {
        Record::new(RecordHeader::new(Tag::new(*tag), FormId::new(id)), vec![0; 4])
            .expect("Test operation should succeed")
    }

    #[test]
    fn test_records_go_to_their_tag_store() {
        let mut registry = Registry::new();
        registry.insert(record(b"WEAP", 0x10));
        registry.insert(record(b"NPC_", 0x20));
        registry.insert(record(b"WEAP", 0x11));

        assert_eq!(registry.store(Tag::new(*b"WEAP")).unwrap().len(), 2);
        assert_eq!(registry.record_count(), 3);
        assert_eq!(
            registry.counts(),
            [(Tag::new(*b"NPC_"), 1), (Tag::new(*b"WEAP"), 2)]
        );
        assert!(registry.get(Tag::new(*b"NPC_"), FormId::new(0x20)).is_some());
        assert!(registry.get(Tag::new(*b"NPC_"), FormId::new(0x10)).is_none());
        assert_eq!(registry.find(FormId::new(0x11)).unwrap().tag(), Tag::new(*b"WEAP"));
    }

    #[test]
    fn test_stores_inherit_dedupe_setting() {
        let mut registry = Registry::new().with_dedupe_equal(true);
        registry.insert(record(b"WEAP", 0x10));
        assert_eq!(registry.insert(record(b"WEAP", 0x10)), InsertOutcome::Unchanged);
    }

    #[test]
    fn test_owner_map() {
        let mut registry = Registry::new();
        let cell = FormId::new(0x0000_3C3C);
        registry.set_owner(FormId::new(0x0000_0010), cell);
        registry.set_owner(FormId::new(0x0000_0009), cell);
        registry.set_owner(FormId::new(0x0000_0020), FormId::new(0x99));

        assert_eq!(registry.owner(FormId::new(0x10)), Some(cell));
        assert_eq!(
            registry.children_of(cell),
            [FormId::new(0x09), FormId::new(0x10)]
        );

        registry.insert(record(b"REFR", 0x10));
        assert!(registry.remove(FormId::new(0x10)));
        assert_eq!(registry.owner(FormId::new(0x10)), None);
        assert!(!registry.remove(FormId::new(0x10)));
    }

    #[test]
    fn test_to_groups_is_ordered() {
        let mut registry = Registry::new();
        registry.insert(record(b"WEAP", 0x0100_0002));
        registry.insert(record(b"ARMO", 0x30));
        registry.insert(record(b"WEAP", 0x0000_0001));
        registry.store_mut(Tag::new(*b"KYWD"));

        let groups = registry.to_groups();
        let labels: Vec<Tag> = groups.iter().map(|g| g.header().label_tag()).collect();
        assert_eq!(labels, [Tag::new(*b"ARMO"), Tag::new(*b"WEAP")]);

        let ids: Vec<u32> = groups[1].records().iter().map(|r| r.form_id().get()).collect();
        assert_eq!(ids, [0x0000_0001, 0x0100_0002]);
    }

    #[test]
    fn test_clear() {
        let mut registry = Registry::new();
        registry.insert(record(b"WEAP", 0x10));
        registry.set_owner(FormId::new(0x10), FormId::new(0x1));
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.owner(FormId::new(0x10)), None);
    }
}
