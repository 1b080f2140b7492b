//! Generic 24-byte record header

use binrw::{BinRead, BinWrite};

use crate::form_id::FormId;
use crate::tag::Tag;

/// Record flag: the record is marked deleted
pub const FLAG_DELETED: u32 = 0x0000_0020;
/// Record flag: the record is ignored by the game
pub const FLAG_IGNORED: u32 = 0x0000_1000;
/// Record flag: the payload is a length prefix plus a zlib stream
pub const FLAG_COMPRESSED: u32 = 0x0004_0000;
/// File header flag: the file is a master file
pub const FLAG_MASTER: u32 = 0x0000_0001;
/// File header flag: text fields live in external string tables
pub const FLAG_LOCALIZED: u32 = 0x0000_0080;

/// Header preceding every record payload
///
/// `size` is the payload length in bytes and does not include the header
/// itself. For compressed records it is the compressed length, including the
/// 4-byte uncompressed-length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct RecordHeader {
    /// Record type
    pub tag: Tag,
    /// Payload length
    pub size: u32,
    /// Flag bits
    pub flags: u32,
    /// Record identifier
    pub form_id: FormId,
    /// Version control revision
    pub revision: u32,
    /// Internal format version
    pub version: u16,
    /// Unused by the engine, preserved for round-trips
    pub unknown: u16,
}

impl RecordHeader {
    /// Encoded header size
    pub const SIZE: usize = 24;

    /// Header with zeroed flags and revision data
    pub fn new(tag: Tag, form_id: FormId) -> Self {
        Self {
            tag,
            size: 0,
            flags: 0,
            form_id,
            revision: 0,
            version: 0,
            unknown: 0,
        }
    }

    /// Whether all bits of `flag` are set
    pub const fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag == flag
    }

    /// Set or clear `flag`
    pub fn set_flag(&mut self, flag: u32, enabled: bool) {
        if enabled {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    /// Whether the payload is compressed
    pub const fn is_compressed(&self) -> bool {
        self.has_flag(FLAG_COMPRESSED)
    }

    /// Whether the record is marked deleted
    pub const fn is_deleted(&self) -> bool {
        self.has_flag(FLAG_DELETED)
    }

    /// Whether the record is marked ignored
    pub const fn is_ignored(&self) -> bool {
        self.has_flag(FLAG_IGNORED)
    }
}
