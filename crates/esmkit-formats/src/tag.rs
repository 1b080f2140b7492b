//! Four-byte type tags naming records, groups and fields

use binrw::{BinRead, BinWrite};
use std::fmt;

/// A four-byte tag such as `GRUP`, `TES4` or `EDID`
///
/// Tags are stored on disk as four raw bytes, which read as ASCII for every
/// tag the game uses.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BinRead, BinWrite)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    /// Group start tag
    pub const GRUP: Self = Self(*b"GRUP");
    /// Mandatory leading file header record
    pub const TES4: Self = Self(*b"TES4");
    /// File header: version, record count and next object id
    pub const HEDR: Self = Self(*b"HEDR");
    /// File header: author
    pub const CNAM: Self = Self(*b"CNAM");
    /// File header: summary
    pub const SNAM: Self = Self(*b"SNAM");
    /// File header: master file name
    pub const MAST: Self = Self(*b"MAST");
    /// File header: auxiliary data following each master
    pub const DATA: Self = Self(*b"DATA");
    /// File header: overridden identifiers
    pub const ONAM: Self = Self(*b"ONAM");
    /// File header: internal value
    pub const INTV: Self = Self(*b"INTV");
    /// File header: optional trailing counter
    pub const INCC: Self = Self(*b"INCC");
    /// Size prefix for fields larger than 64 KiB
    pub const XXXX: Self = Self(*b"XXXX");

    /// Create a tag from its four bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Interpret a little-endian `u32` as a tag
    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_le_bytes())
    }

    /// The tag as a little-endian `u32`
    pub const fn as_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Raw bytes
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for Tag {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&str> for Tag {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let bytes: [u8; 4] = value
            .as_bytes()
            .try_into()
            .map_err(|_| format!("tag must be exactly four bytes: {value:?}"))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02X}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}
