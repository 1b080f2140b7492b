//! 32-bit record identifiers ("form IDs")
//!
//! The low 24 bits index an object inside the file that defined it. The high
//! 8 bits are a mod index: the position of that defining file in some frame
//! of reference, either a file's own master list (plus itself last) or the
//! global load order.

use binrw::{BinRead, BinWrite};
use std::fmt;

/// Mask selecting the object index bits
pub const OBJECT_INDEX_MASK: u32 = 0x00FF_FFFF;

/// Record identifier with a mod index in its high byte
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BinRead, BinWrite)]
#[brw(little)]
pub struct FormId(pub u32);

impl FormId {
    /// The null identifier
    pub const NULL: Self = Self(0);

    /// Create an identifier from its raw value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Assemble an identifier from a mod index and an object index
    pub const fn from_parts(mod_index: u8, object_index: u32) -> Self {
        Self(((mod_index as u32) << 24) | (object_index & OBJECT_INDEX_MASK))
    }

    /// Raw value
    pub const fn get(self) -> u32 {
        self.0
    }

    /// High byte: position of the defining file in the current frame
    pub const fn mod_index(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Low 24 bits
    pub const fn object_index(self) -> u32 {
        self.0 & OBJECT_INDEX_MASK
    }

    /// Same object index under a different mod index
    #[must_use]
    pub const fn with_mod_index(self, mod_index: u8) -> Self {
        Self::from_parts(mod_index, self.0)
    }

    /// Whether this is the null identifier
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Hex rendering with the mod index replaced by `xx`
    ///
    /// Identifiers from the first file (mod index zero) keep their digits,
    /// since their value does not depend on the load order.
    pub fn masked(self) -> String {
        if self.mod_index() == 0 {
            self.to_string()
        } else {
            format!("xx{:06X}", self.object_index())
        }
    }
}

impl From<u32> for FormId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<FormId> for u32 {
    fn from(id: FormId) -> Self {
        id.0
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl fmt::Debug for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormId({:08X})", self.0)
    }
}
