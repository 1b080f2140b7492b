//! Group header and group type

use binrw::{BinRead, BinWrite};

use crate::form_id::FormId;
use crate::tag::Tag;

/// Kind of group, which decides how its label is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupType {
    /// Top-level group; label is the record tag of its members
    TopLevel,
    /// Children of a world space; label is the world's identifier
    WorldChildren,
    /// Interior cell block; label is the block number
    InteriorCellBlock,
    /// Interior cell sub-block; label is the sub-block number
    InteriorCellSubBlock,
    /// Exterior cell block; label packs grid Y and X
    ExteriorCellBlock,
    /// Exterior cell sub-block; label packs grid Y and X
    ExteriorCellSubBlock,
    /// Children of a cell; label is the cell's identifier
    CellChildren,
    /// Children of a dialogue topic; label is the topic's identifier
    TopicChildren,
    /// Persistent children of a cell; label is the cell's identifier
    CellPersistentChildren,
    /// Temporary children of a cell; label is the cell's identifier
    CellTemporaryChildren,
    /// Visible-distant children of a cell; label is the cell's identifier
    CellVisibleDistantChildren,
    /// A type value this library does not know
    Unknown(u32),
}

impl GroupType {
    /// Decode the on-disk value
    pub const fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::TopLevel,
            1 => Self::WorldChildren,
            2 => Self::InteriorCellBlock,
            3 => Self::InteriorCellSubBlock,
            4 => Self::ExteriorCellBlock,
            5 => Self::ExteriorCellSubBlock,
            6 => Self::CellChildren,
            7 => Self::TopicChildren,
            8 => Self::CellPersistentChildren,
            9 => Self::CellTemporaryChildren,
            10 => Self::CellVisibleDistantChildren,
            other => Self::Unknown(other),
        }
    }

    /// On-disk value
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::TopLevel => 0,
            Self::WorldChildren => 1,
            Self::InteriorCellBlock => 2,
            Self::InteriorCellSubBlock => 3,
            Self::ExteriorCellBlock => 4,
            Self::ExteriorCellSubBlock => 5,
            Self::CellChildren => 6,
            Self::TopicChildren => 7,
            Self::CellPersistentChildren => 8,
            Self::CellTemporaryChildren => 9,
            Self::CellVisibleDistantChildren => 10,
            Self::Unknown(value) => value,
        }
    }

    /// Whether the label of a group of this type is an owning record's identifier
    pub const fn has_form_id_label(self) -> bool {
        matches!(
            self,
            Self::WorldChildren
                | Self::CellChildren
                | Self::TopicChildren
                | Self::CellPersistentChildren
                | Self::CellTemporaryChildren
                | Self::CellVisibleDistantChildren
        )
    }
}

impl From<u32> for GroupType {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

/// Header preceding every group body
///
/// Unlike a record header, `size` counts the 24 header bytes too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little, magic = b"GRUP")]
pub struct GroupHeader {
    /// Total group size including this header
    pub size: u32,
    /// Type-dependent label
    pub label: u32,
    /// Group type
    #[br(map = |x: u32| GroupType::from_u32(x))]
    #[bw(map = |t: &GroupType| t.as_u32())]
    pub group_type: GroupType,
    /// Date stamp
    pub stamp: u32,
    /// Unused by the engine, preserved for round-trips
    pub unknown: u32,
}

impl GroupHeader {
    /// Encoded header size
    pub const SIZE: usize = 24;

    /// Header of an empty group
    pub const fn new(label: u32, group_type: GroupType) -> Self {
        Self {
            size: Self::SIZE as u32,
            label,
            group_type,
            stamp: 0,
            unknown: 0,
        }
    }

    /// Header of an empty top-level group for records tagged `tag`
    pub const fn top_level(tag: Tag) -> Self {
        Self::new(tag.as_u32(), GroupType::TopLevel)
    }

    /// Header of an empty group owned by the record `owner`
    pub const fn children_of(owner: FormId, group_type: GroupType) -> Self {
        Self::new(owner.get(), group_type)
    }

    /// Label read as a record tag
    pub const fn label_tag(&self) -> Tag {
        Tag::from_u32(self.label)
    }

    /// Label read as an owning record's identifier, for types that carry one
    pub const fn label_form_id(&self) -> Option<FormId> {
        if self.group_type.has_form_id_label() {
            Some(FormId::new(self.label))
        } else {
            None
        }
    }

    /// Whether two headers name the same group: equal label and type
    pub fn same_group(&self, other: &Self) -> bool {
        self.label == other.label && self.group_type == other.group_type
    }

    /// Bytes of the group body
    pub const fn body_size(&self) -> u32 {
        self.size.saturating_sub(Self::SIZE as u32)
    }
}
