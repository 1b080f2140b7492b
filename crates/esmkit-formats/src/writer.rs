//! Serializing a file header and a group tree
//!
//! Writing happens in two passes: group sizes are computed bottom-up over
//! the whole tree, then header and groups are written depth-first in member
//! order, which is the order the walker reads them back in.

use std::io::{Seek, Write};

use crate::error::{FormatError, FormatResult};
use crate::file_header::FileHeader;
use crate::group::Group;

/// Records plus groups below the top level, as stored in `HEDR`
pub fn count_records_and_groups(groups: &[Group]) -> usize {
    groups
        .iter()
        .map(|g| 1 + g.total_groups() + g.total_records())
        .sum()
}

/// Recompute group sizes and the header's record count
pub fn prepare(header: &mut FileHeader, groups: &mut [Group]) -> FormatResult<()> {
    for group in groups.iter_mut() {
        group.update_sizes()?;
    }
    let count = count_records_and_groups(groups);
    header.record_count = u32::try_from(count).map_err(|_| FormatError::TooLarge {
        what: "record count",
        size: count,
    })?;
    Ok(())
}

/// Write `header` then `groups` exactly as stored
///
/// Returns the number of bytes written.
pub fn write_prepared<W: Write + Seek>(
    writer: &mut W,
    header: &FileHeader,
    groups: &[Group],
) -> FormatResult<u64> {
    let start = writer.stream_position()?;
    header.write(writer)?;
    for group in groups {
        group.write(writer)?;
    }
    Ok(writer.stream_position()? - start)
}

/// Size, count, then write a whole container
pub fn write_container<W: Write + Seek>(
    writer: &mut W,
    header: &mut FileHeader,
    groups: &mut [Group],
) -> FormatResult<u64> {
    prepare(header, groups)?;
    write_prepared(writer, header, groups)
}
