//! Streaming walk over the group tree of a container
//!
//! The walker reads one block at a time. For each group it first asks the
//! visitor whether the group is wanted; unwanted groups are skipped with a
//! single seek over their declared size, so nothing inside them is read.
//! Records inside wanted groups go through a [`DispatchTable`].
//!
//! Byte accounting is exact: after a group has been processed, skipped or
//! not, the stream sits at the group's start plus its declared size. A body
//! that does not end precisely there is reported as
//! [`FormatError::GroupOverrun`].

use std::io::{self, Cursor, Read, Seek, SeekFrom};

use binrw::BinRead;

use crate::dispatch::{DispatchTable, RecordOutcome};
use crate::error::{FormatError, FormatResult};
use crate::file_header::FileHeader;
use crate::group::GroupHeader;
use crate::record::{Record, RecordHeader};
use crate::tag::Tag;

/// Caller side of a walk
///
/// Every method has a default, so a visitor only overrides the hooks it
/// needs. Record handling lives in the [`DispatchTable`] passed next to
/// the visitor.
pub trait ContainerVisitor {
    /// Error type of handlers and hooks
    type Error: From<FormatError>;

    /// Whether the group described by `header` should be descended into
    fn wants_group(&mut self, header: &GroupHeader) -> bool {
        let _ = header;
        true
    }

    /// A wanted group is about to be read; `depth` is 0 for top-level groups
    fn group_started(&mut self, header: &GroupHeader, depth: usize) -> Result<(), Self::Error> {
        let _ = (header, depth);
        Ok(())
    }

    /// A wanted group has been fully read
    fn group_finished(&mut self, header: &GroupHeader, depth: usize) -> Result<(), Self::Error> {
        let _ = (header, depth);
        Ok(())
    }

    /// An unwanted group at `offset` was skipped
    fn group_skipped(&mut self, header: &GroupHeader, offset: u64) {
        let _ = (header, offset);
    }
}

/// Walks container streams, dispatching records through a table
#[derive(Debug)]
pub struct ContainerWalker<'t, V: ContainerVisitor> {
    table: &'t DispatchTable<V>,
}

impl<'t, V: ContainerVisitor> ContainerWalker<'t, V> {
    /// Walker using `table` for record dispatch
    pub fn new(table: &'t DispatchTable<V>) -> Self {
        Self { table }
    }

    /// Read the file header, then walk every top-level group
    ///
    /// Returns the header and the number of relevant records.
    pub fn walk_file<R: Read + Seek>(
        &self,
        reader: &mut R,
        visitor: &mut V,
    ) -> Result<(FileHeader, u64), V::Error> {
        let header = FileHeader::read(reader)?;
        let count = self.walk_groups(reader, visitor)?;
        Ok((header, count))
    }

    /// Walk top-level groups from the current position to the end of the stream
    ///
    /// Only groups may appear at the top level. Returns the number of
    /// relevant records across all groups.
    pub fn walk_groups<R: Read + Seek>(
        &self,
        reader: &mut R,
        visitor: &mut V,
    ) -> Result<u64, V::Error> {
        let end = stream_end(reader)?;
        let mut count = 0;
        loop {
            let offset = reader.stream_position().map_err(FormatError::from)?;
            if offset >= end {
                break;
            }
            ensure_available(offset, BLOCK_SIZE as u64, end)?;
            let block = read_block(reader)?;
            count += self.walk_group_from(reader, visitor, offset, &block, end, 0)?;
        }
        Ok(count)
    }

    /// Process the single group starting at the current position
    ///
    /// Returns the number of relevant records inside it, at any depth, or
    /// zero if the visitor skipped it.
    pub fn walk_group<R: Read + Seek>(
        &self,
        reader: &mut R,
        visitor: &mut V,
    ) -> Result<u64, V::Error> {
        let end = stream_end(reader)?;
        let offset = reader.stream_position().map_err(FormatError::from)?;
        ensure_available(offset, BLOCK_SIZE as u64, end)?;
        let block = read_block(reader)?;
        self.walk_group_from(reader, visitor, offset, &block, end, 0)
    }

    /// Walk the group whose header block, read at `offset`, is `block`
    fn walk_group_from<R: Read + Seek>(
        &self,
        reader: &mut R,
        visitor: &mut V,
        offset: u64,
        block: &[u8; BLOCK_SIZE],
        limit: u64,
        depth: usize,
    ) -> Result<u64, V::Error> {
        let tag = block_tag(block);
        if tag != Tag::GRUP {
            return Err(FormatError::UnexpectedTag {
                offset,
                expected: Tag::GRUP,
                found: tag,
            }
            .into());
        }
        let header = GroupHeader::read(&mut Cursor::new(block)).map_err(FormatError::from)?;
        if (header.size as usize) < GroupHeader::SIZE {
            return Err(FormatError::InvalidGroupSize {
                offset,
                size: header.size,
            }
            .into());
        }
        let body_start = offset + GroupHeader::SIZE as u64;
        let end = offset + u64::from(header.size);
        ensure_within(body_start, end - body_start, limit, depth > 0)?;

        if !visitor.wants_group(&header) {
            reader.seek(SeekFrom::Start(end)).map_err(FormatError::from)?;
            visitor.group_skipped(&header, offset);
            return Ok(0);
        }

        visitor.group_started(&header, depth)?;
        let mut count = 0;
        loop {
            let position = reader.stream_position().map_err(FormatError::from)?;
            if position >= end {
                if position != end {
                    return Err(FormatError::GroupOverrun {
                        offset: position,
                        end,
                    }
                    .into());
                }
                break;
            }
            ensure_within(position, BLOCK_SIZE as u64, end, true)?;
            let block = read_block(reader)?;
            if block_tag(&block) == Tag::GRUP {
                count += self.walk_group_from(reader, visitor, position, &block, end, depth + 1)?;
            } else {
                count += self.walk_record(reader, visitor, position, &block, end)?;
            }
        }
        visitor.group_finished(&header, depth)?;
        Ok(count)
    }

    fn walk_record<R: Read + Seek>(
        &self,
        reader: &mut R,
        visitor: &mut V,
        offset: u64,
        block: &[u8; BLOCK_SIZE],
        group_end: u64,
    ) -> Result<u64, V::Error> {
        let header = RecordHeader::read(&mut Cursor::new(block)).map_err(FormatError::from)?;
        let body_start = offset + RecordHeader::SIZE as u64;
        let record_end = body_start + u64::from(header.size);
        if record_end > group_end {
            return Err(FormatError::GroupOverrun {
                offset: record_end,
                end: group_end,
            }
            .into());
        }

        let Some(handler) = self.table.handler(header.tag) else {
            skip_body(reader, body_start, u64::from(header.size))?;
            return Ok(0);
        };
        let record = Record::read_body(header, reader)?;
        match handler(visitor, record)? {
            RecordOutcome::Relevant => Ok(1),
            RecordOutcome::Ignored => Ok(0),
        }
    }
}

/// Record and group headers share this size and lead with their tag
const BLOCK_SIZE: usize = RecordHeader::SIZE;

const _: () = assert!(GroupHeader::SIZE == BLOCK_SIZE);

/// Read one header block
///
/// Headers are read forward only and decoded from the block, so a buffered
/// reader keeps its buffer between members.
fn read_block<R: Read>(reader: &mut R) -> FormatResult<[u8; BLOCK_SIZE]> {
    let mut block = [0u8; BLOCK_SIZE];
    reader.read_exact(&mut block)?;
    Ok(block)
}

fn block_tag(block: &[u8; BLOCK_SIZE]) -> Tag {
    Tag::new([block[0], block[1], block[2], block[3]])
}

/// Consume a record body nobody handles
///
/// Bodies are drained rather than seeked over; a seek would drop the
/// reader's buffer once per record.
fn skip_body<R: Read>(reader: &mut R, offset: u64, size: u64) -> FormatResult<()> {
    let skipped = io::copy(&mut reader.by_ref().take(size), &mut io::sink())?;
    if skipped < size {
        return Err(FormatError::Truncated {
            offset,
            needed: size,
            available: skipped,
        });
    }
    Ok(())
}

fn stream_end<R: Seek>(reader: &mut R) -> FormatResult<u64> {
    let position = reader.stream_position()?;
    let end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(position))?;
    Ok(end)
}

fn ensure_available(offset: u64, needed: u64, end: u64) -> FormatResult<()> {
    let available = end.saturating_sub(offset);
    if needed > available {
        return Err(FormatError::Truncated {
            offset,
            needed,
            available,
        });
    }
    Ok(())
}

/// Bounds check against the stream end, or against the parent group's end
/// when `nested`
fn ensure_within(offset: u64, needed: u64, limit: u64, nested: bool) -> FormatResult<()> {
    if nested && offset + needed > limit {
        return Err(FormatError::GroupOverrun {
            offset: offset + needed,
            end: limit,
        });
    }
    ensure_available(offset, needed, limit)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::form_id::FormId;
    use crate::group::GroupType;
    use crate::test_utils::{group_bytes, record_bytes};
    use std::io::BufReader;

    #[derive(Default)]
    struct Collect {
        seen: Vec<(Tag, FormId)>,
        started: Vec<(u32, usize)>,
        finished: usize,
        skipped: Vec<u64>,
        skip_label: Option<u32>,
    }

    impl ContainerVisitor for Collect {
        type Error = FormatError;

        fn wants_group(&mut self, header: &GroupHeader) -> bool {
            self.skip_label != Some(header.label)
        }

        fn group_started(&mut self, header: &GroupHeader, depth: usize) -> FormatResult<()> {
            self.started.push((header.label, depth));
            Ok(())
        }

        fn group_finished(&mut self, _header: &GroupHeader, _depth: usize) -> FormatResult<()> {
            self.finished += 1;
            Ok(())
        }

        fn group_skipped(&mut self, _header: &GroupHeader, offset: u64) {
            self.skipped.push(offset);
        }
    }

    fn collect(v: &mut Collect, record: Record) -> FormatResult<RecordOutcome> {
        v.seen.push((record.tag(), record.form_id()));
        Ok(RecordOutcome::Relevant)
    }

    const CELL: Tag = Tag::new(*b"CELL");
    const REFR: Tag = Tag::new(*b"REFR");

    /// Top-level CELL group holding a cell, its children and a second cell
    fn cell_group() -> Vec<u8> {
        let refs = [record_bytes(REFR, 0x11, b"ab"), record_bytes(REFR, 0x12, b"cd")].concat();
        let temporary = group_bytes(0x10, GroupType::CellTemporaryChildren, &refs);
        let children = group_bytes(0x10, GroupType::CellChildren, &temporary);
        let body = [
            record_bytes(CELL, 0x10, b"cell one"),
            children,
            record_bytes(CELL, 0x20, b"cell two"),
        ]
        .concat();
        group_bytes(CELL.as_u32(), GroupType::TopLevel, &body)
    }

    #[test]
    fn test_counts_nested_records() {
        let table = DispatchTable::with_fallback(collect);
        let walker = ContainerWalker::new(&table);
        let mut visitor = Collect::default();

        let count = walker
            .walk_groups(&mut Cursor::new(cell_group()), &mut visitor)
            .expect("Test operation should succeed");
        assert_eq!(count, 4);
        assert_eq!(
            visitor.seen,
            vec![
                (CELL, FormId::new(0x10)),
                (REFR, FormId::new(0x11)),
                (REFR, FormId::new(0x12)),
                (CELL, FormId::new(0x20)),
            ]
        );
        assert_eq!(visitor.started, vec![(CELL.as_u32(), 0), (0x10, 1), (0x10, 2)]);
        assert_eq!(visitor.finished, 3);
    }

    #[test]
    fn test_unhandled_tags_are_skipped_unread() {
        let table = DispatchTable::new().with(CELL, collect);
        let walker = ContainerWalker::new(&table);
        let mut visitor = Collect::default();

        let data = cell_group();
        let mut cursor = Cursor::new(&data);
        let count = walker
            .walk_groups(&mut cursor, &mut visitor)
            .expect("Test operation should succeed");
        assert_eq!(count, 2);
        assert_eq!(cursor.position() as usize, data.len());
    }

    #[test]
    fn test_skipped_group_advances_by_size() {
        let table = DispatchTable::with_fallback(collect);
        let walker = ContainerWalker::new(&table);
        let mut visitor = Collect {
            skip_label: Some(0x10),
            ..Collect::default()
        };

        let count = walker
            .walk_groups(&mut Cursor::new(cell_group()), &mut visitor)
            .expect("Test operation should succeed");
        assert_eq!(count, 2);
        assert_eq!(visitor.skipped, vec![24 + 32]);
        assert_eq!(visitor.started.len(), 1);
    }

    #[test]
    fn test_record_at_top_level_is_rejected() {
        let table = DispatchTable::with_fallback(collect);
        let walker = ContainerWalker::new(&table);
        let data = record_bytes(CELL, 1, b"");

        let result = walker.walk_groups(&mut Cursor::new(data), &mut Collect::default());
        assert!(matches!(
            result,
            Err(FormatError::UnexpectedTag { offset: 0, expected, .. }) if expected == Tag::GRUP
        ));
    }

    #[test]
    fn test_group_size_below_header() {
        let mut data = group_bytes(1, GroupType::TopLevel, b"");
        data[4..8].copy_from_slice(&10u32.to_le_bytes());

        let table = DispatchTable::with_fallback(collect);
        let result = ContainerWalker::new(&table).walk_groups(&mut Cursor::new(data), &mut Collect::default());
        assert!(matches!(result, Err(FormatError::InvalidGroupSize { size: 10, .. })));
    }

    #[test]
    fn test_truncated_group() {
        let mut data = cell_group();
        data.truncate(data.len() - 1);

        let table = DispatchTable::with_fallback(collect);
        let result = ContainerWalker::new(&table).walk_groups(&mut Cursor::new(data), &mut Collect::default());
        assert!(matches!(result, Err(FormatError::Truncated { offset: 24, .. })));
    }

    #[test]
    fn test_record_overrunning_group() {
        // group claims room for the header only, record spills past it
        let record = record_bytes(CELL, 1, b"xyz");
        let mut data = group_bytes(CELL.as_u32(), GroupType::TopLevel, &record);
        data[4..8].copy_from_slice(&(24u32 + 24).to_le_bytes());

        let table = DispatchTable::with_fallback(collect);
        let result = ContainerWalker::new(&table).walk_groups(&mut Cursor::new(data), &mut Collect::default());
        assert!(matches!(result, Err(FormatError::GroupOverrun { end: 48, .. })));
    }

    /// Stream that counts the bytes pulled from it
    struct Counting<R> {
        inner: R,
        read: u64,
    }

    impl<R: Read> Read for Counting<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.read += n as u64;
            Ok(n)
        }
    }

    impl<R: Seek> Seek for Counting<R> {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_buffered_reader_is_not_refilled_per_member() {
        // handled CELLs interleaved with unhandled REFRs
        let body: Vec<u8> = (0..2000u32)
            .flat_map(|i| {
                let tag = if i % 2 == 0 { CELL } else { REFR };
                record_bytes(tag, i + 1, b"12345678")
            })
            .collect();
        let data = group_bytes(CELL.as_u32(), GroupType::TopLevel, &body);

        let table = DispatchTable::new().with(CELL, collect);
        let mut visitor = Collect::default();
        let mut reader = BufReader::new(Counting {
            inner: Cursor::new(&data),
            read: 0,
        });
        let count = ContainerWalker::new(&table)
            .walk_groups(&mut reader, &mut visitor)
            .expect("Test operation should succeed");

        assert_eq!(count, 1000);
        assert!(
            reader.get_ref().read <= 2 * data.len() as u64,
            "read {} bytes from a {} byte stream",
            reader.get_ref().read,
            data.len()
        );
    }
}
