//! Whole-file view: file header plus the full group tree

use std::io::{Cursor, Read, Seek};

use crate::EsmFormat;
use crate::dispatch::{DispatchTable, RecordOutcome};
use crate::error::{FormatError, FormatResult};
use crate::file_header::FileHeader;
use crate::group::{Group, GroupHeader};
use crate::record::Record;
use crate::tag::Tag;
use crate::walker::{ContainerVisitor, ContainerWalker};
use crate::writer;

/// A parsed container file
///
/// Records keep their stored payloads, so an unmodified file builds back
/// to identical bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerFile {
    /// Leading header record
    pub header: FileHeader,
    /// Top-level groups in file order
    pub groups: Vec<Group>,
}

impl ContainerFile {
    /// Empty file with the given header
    pub fn new(header: FileHeader) -> Self {
        Self {
            header,
            groups: Vec::new(),
        }
    }

    /// Read a whole container from a stream
    pub fn read<R: Read + Seek>(reader: &mut R) -> FormatResult<Self> {
        let table = DispatchTable::with_fallback(TreeBuilder::add_record);
        let mut builder = TreeBuilder::default();
        let (header, _) = ContainerWalker::new(&table).walk_file(reader, &mut builder)?;
        Ok(Self {
            header,
            groups: builder.groups,
        })
    }

    /// Top-level group holding records tagged `tag`
    pub fn group(&self, tag: Tag) -> Option<&Group> {
        self.groups
            .iter()
            .find(|g| g.header().same_group(&GroupHeader::top_level(tag)))
    }

    /// Top-level group for `tag`, created at the end if missing
    pub fn group_mut_or_insert(&mut self, tag: Tag) -> &mut Group {
        let wanted = GroupHeader::top_level(tag);
        let position = match self.groups.iter().position(|g| g.header().same_group(&wanted)) {
            Some(position) => position,
            None => {
                self.groups.push(Group::new(wanted));
                self.groups.len() - 1
            }
        };
        &mut self.groups[position]
    }

    /// Records in all groups
    pub fn total_records(&self) -> usize {
        self.groups.iter().map(Group::total_records).sum()
    }

    /// Recompute group sizes and the header's record count
    pub fn finalize(&mut self) -> FormatResult<()> {
        writer::prepare(&mut self.header, &mut self.groups)
    }

    /// Bytes the file occupies on disk
    pub fn written_size(&self) -> usize {
        self.header.written_size() + self.groups.iter().map(Group::written_size).sum::<usize>()
    }
}

impl EsmFormat for ContainerFile {
    fn parse(data: &[u8]) -> FormatResult<Self> {
        Self::read(&mut Cursor::new(data))
    }

    /// Sizes are written as stored; call [`ContainerFile::finalize`] after
    /// changing the tree.
    fn build(&self) -> FormatResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(self.written_size()));
        writer::write_prepared(&mut cursor, &self.header, &self.groups)?;
        Ok(cursor.into_inner())
    }
}

/// Read only the leading header record of a container
///
/// Record bodies are never touched.
pub fn peek_file_header<R: Read + Seek>(reader: &mut R) -> FormatResult<FileHeader> {
    FileHeader::read(reader)
}

/// Visitor assembling the full tree
///
/// `path` holds the position of each open group within its parent, with
/// the first entry indexing the top-level list.
#[derive(Debug, Default)]
struct TreeBuilder {
    groups: Vec<Group>,
    path: Vec<usize>,
}

impl TreeBuilder {
    fn current(&mut self) -> Option<&mut Group> {
        let (first, rest) = self.path.split_first()?;
        let mut group = self.groups.get_mut(*first)?;
        for &position in rest {
            group = group.group_at_mut(position)?;
        }
        Some(group)
    }

    fn add_record(&mut self, record: Record) -> FormatResult<RecordOutcome> {
        record.verify_payload()?;
        let group = self.current().ok_or(FormatError::NoEnclosingGroup {
            found: record.tag(),
        })?;
        group.add_record(record);
        Ok(RecordOutcome::Relevant)
    }
}

impl ContainerVisitor for TreeBuilder {
    type Error = FormatError;

    fn group_started(&mut self, header: &GroupHeader, _depth: usize) -> FormatResult<()> {
        if self.path.is_empty() {
            self.groups.push(Group::new(*header));
            self.path.push(self.groups.len() - 1);
            return Ok(());
        }
        let Some(parent) = self.current() else {
            return Err(FormatError::NoEnclosingGroup { found: Tag::GRUP });
        };
        parent.add_group(*header);
        let position = parent.groups().len() - 1;
        self.path.push(position);
        Ok(())
    }

    fn group_finished(&mut self, _header: &GroupHeader, _depth: usize) -> FormatResult<()> {
        self.path.pop();
        Ok(())
    }
}
