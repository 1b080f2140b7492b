//! In-memory group tree
//!
//! A [`Group`] exclusively owns its records and sub-groups. Records are also
//! indexed by identifier within the group; identifiers are not required to
//! be unique across different groups.
//!
//! Besides the two member lists, a group remembers the order in which
//! records and sub-groups were appended. Container files interleave them (a
//! `CELL` record is followed by that cell's children group), and writing
//! members back in their original order keeps round-trips byte-identical.

pub mod header;

pub use header::{GroupHeader, GroupType};

use std::collections::HashMap;
use std::io::Write;

use binrw::BinWrite;
use binrw::io::Seek;

use crate::error::{FormatError, FormatResult};
use crate::form_id::FormId;
use crate::record::Record;
use crate::tag::Tag;

/// Position of one member in a group's layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Record(usize),
    Group(usize),
}

/// A borrowed group member, in layout order
#[derive(Debug, Clone, Copy)]
pub enum Member<'a> {
    /// A record
    Record(&'a Record),
    /// A sub-group
    Group(&'a Group),
}

/// A group and everything beneath it
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    header: GroupHeader,
    records: Vec<Record>,
    index: HashMap<FormId, usize>,
    groups: Vec<Group>,
    layout: Vec<Slot>,
}

impl Group {
    /// Empty group with the given header
    pub fn new(header: GroupHeader) -> Self {
        Self {
            header,
            records: Vec::new(),
            index: HashMap::new(),
            groups: Vec::new(),
            layout: Vec::new(),
        }
    }

    /// Empty top-level group for records tagged `tag`
    pub fn top_level(tag: Tag) -> Self {
        Self::new(GroupHeader::top_level(tag))
    }

    /// Header, with `size` as last read or computed
    pub fn header(&self) -> &GroupHeader {
        &self.header
    }

    /// Mutable header
    pub fn header_mut(&mut self) -> &mut GroupHeader {
        &mut self.header
    }

    /// Append a record
    ///
    /// The identifier index entry points at the new record, replacing any
    /// earlier record with the same identifier in this group.
    pub fn add_record(&mut self, record: Record) -> usize {
        let position = self.records.len();
        self.index.insert(record.form_id(), position);
        self.records.push(record);
        self.layout.push(Slot::Record(position));
        position
    }

    /// Append an empty sub-group and return it for population
    pub fn add_group(&mut self, header: GroupHeader) -> &mut Self {
        let position = self.groups.len();
        self.groups.push(Self::new(header));
        self.layout.push(Slot::Group(position));
        &mut self.groups[position]
    }

    /// Direct records in append order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Direct sub-groups in append order
    pub fn groups(&self) -> &[Self] {
        &self.groups
    }

    /// Direct records and sub-groups in append order
    pub fn members(&self) -> impl Iterator<Item = Member<'_>> {
        self.layout.iter().map(|slot| match *slot {
            Slot::Record(i) => Member::Record(&self.records[i]),
            Slot::Group(i) => Member::Group(&self.groups[i]),
        })
    }

    /// Whether a direct record has this identifier
    pub fn has_record(&self, form_id: FormId) -> bool {
        self.index.contains_key(&form_id)
    }

    /// Direct record by identifier
    pub fn record(&self, form_id: FormId) -> Option<&Record> {
        self.index.get(&form_id).map(|&i| &self.records[i])
    }

    /// Mutable direct record by identifier
    pub fn record_mut(&mut self, form_id: FormId) -> Option<&mut Record> {
        let position = *self.index.get(&form_id)?;
        self.records.get_mut(position)
    }

    /// Direct sub-group whose label and type match `header`
    pub fn group(&self, header: &GroupHeader) -> Option<&Self> {
        self.groups.iter().find(|g| g.header.same_group(header))
    }

    /// Mutable direct sub-group whose label and type match `header`
    pub fn group_mut(&mut self, header: &GroupHeader) -> Option<&mut Self> {
        self.groups.iter_mut().find(|g| g.header.same_group(header))
    }

    /// Direct sub-group by append position
    pub fn group_at(&self, position: usize) -> Option<&Self> {
        self.groups.get(position)
    }

    /// Mutable direct sub-group by append position
    pub fn group_at_mut(&mut self, position: usize) -> Option<&mut Self> {
        self.groups.get_mut(position)
    }

    /// Most recently appended group `level` steps down
    ///
    /// Level 0 is this group, level 1 its last sub-group, level 2 the last
    /// sub-group of that, and so on.
    pub fn latest_group_at_level(&mut self, level: usize) -> Option<&mut Self> {
        let mut group = self;
        for _ in 0..level {
            group = group.groups.last_mut()?;
        }
        Some(group)
    }

    /// Rebuild the identifier index from the record list
    ///
    /// Later records win over earlier ones with the same identifier,
    /// matching what a sequence of [`Group::add_record`] calls produces.
    pub fn rebuild_index(&mut self) {
        self.index.clear();
        for (position, record) in self.records.iter().enumerate() {
            self.index.insert(record.form_id(), position);
        }
    }

    /// True if there are no records here or anywhere below
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.groups.iter().all(Self::is_empty)
    }

    /// Records in this group and all sub-groups
    pub fn total_records(&self) -> usize {
        self.records.len() + self.groups.iter().map(Self::total_records).sum::<usize>()
    }

    /// Sub-groups at every depth below this group
    pub fn total_groups(&self) -> usize {
        self.groups.len() + self.groups.iter().map(Self::total_groups).sum::<usize>()
    }

    /// Drop all direct records
    pub fn remove_records(&mut self) {
        self.records.clear();
        self.index.clear();
        self.layout.retain(|slot| matches!(slot, Slot::Group(_)));
    }

    /// Drop all direct sub-groups
    pub fn remove_groups(&mut self) {
        self.groups.clear();
        self.layout.retain(|slot| matches!(slot, Slot::Record(_)));
    }

    /// Remove the first direct sub-group matching `header`
    ///
    /// Returns whether one was removed.
    pub fn delete_group(&mut self, header: &GroupHeader) -> bool {
        match self.groups.iter().position(|g| g.header.same_group(header)) {
            Some(position) => {
                self.remove_group_at(position);
                true
            }
            None => false,
        }
    }

    /// Remove empty sub-groups at every depth, returning how many went
    pub fn purge_empty(&mut self) -> usize {
        let mut removed = 0;
        for group in &mut self.groups {
            removed += group.purge_empty();
        }
        let mut position = 0;
        while position < self.groups.len() {
            if self.groups[position].is_empty() {
                self.remove_group_at(position);
                removed += 1;
            } else {
                position += 1;
            }
        }
        removed
    }

    fn remove_group_at(&mut self, position: usize) {
        self.groups.remove(position);
        self.layout.retain(|slot| *slot != Slot::Group(position));
        for slot in &mut self.layout {
            if let Slot::Group(i) = slot
                && *i > position
            {
                *i -= 1;
            }
        }
    }

    /// Bytes this group occupies on disk, computed from its members
    pub fn written_size(&self) -> usize {
        GroupHeader::SIZE
            + self.records.iter().map(Record::written_size).sum::<usize>()
            + self.groups.iter().map(Self::written_size).sum::<usize>()
    }

    /// Recompute `size` for this group and every group below it
    ///
    /// Sub-groups are sized first, so each parent sums final child sizes.
    /// Returns the new size of this group.
    pub fn update_sizes(&mut self) -> FormatResult<u32> {
        let mut total = GroupHeader::SIZE;
        for group in &mut self.groups {
            total += group.update_sizes()? as usize;
        }
        total += self.records.iter().map(Record::written_size).sum::<usize>();
        self.header.size = u32::try_from(total).map_err(|_| FormatError::TooLarge {
            what: "group",
            size: total,
        })?;
        Ok(self.header.size)
    }

    /// Write the header then every member in layout order
    ///
    /// Sizes are written as stored; call [`Group::update_sizes`] first after
    /// changing the tree.
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> FormatResult<()> {
        self.header.write(writer)?;
        for member in self.members() {
            match member {
                Member::Record(record) => record.write(writer)?,
                Member::Group(group) => group.write(writer)?,
            }
        }
        Ok(())
    }
}
