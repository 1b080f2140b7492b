//! Writing container files to disk

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use esmkit_formats::{FileHeader, Group, writer};
use tracing::info;

use crate::registry::Registry;
use crate::{LoaderError, Result};

/// Write `header` and `groups` to `path`
///
/// Group sizes and the header's record count are recomputed first, so
/// the tree may have been edited freely. Returns the number of bytes
/// written.
pub fn write_container<P: AsRef<Path>>(
    path: P,
    header: &mut FileHeader,
    groups: &mut [Group],
) -> Result<u64> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| LoaderError::from(e).in_file(path, 0))?;
    let mut out = BufWriter::new(file);

    let written = writer::write_container(&mut out, header, groups)
        .map_err(|e| LoaderError::from(e).in_file(path, 0))?;
    out.flush()
        .map_err(|e| LoaderError::from(e).in_file(path, written))?;

    info!(
        "Wrote {}: {} groups, {} records and groups counted, {} bytes",
        path.display(),
        groups.len(),
        header.record_count,
        written
    );
    Ok(written)
}

/// Write every store of `registry` as one top-level group per tag
pub fn write_registry<P: AsRef<Path>>(
    path: P,
    header: &mut FileHeader,
    registry: &Registry,
) -> Result<u64> {
    let mut groups = registry.to_groups();
    write_container(path, header, &mut groups)
}
