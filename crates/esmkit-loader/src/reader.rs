//! Reading container files into a [`Registry`]

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Seek};
use std::path::Path;

use esmkit_formats::{
    ContainerVisitor, ContainerWalker, DispatchTable, FileHeader, FormId, GroupHeader, GroupType,
    Record, RecordOutcome, Tag,
};
use tracing::{debug, info, trace};

use crate::config::LoadConfig;
use crate::descriptor::plugin_name;
use crate::registry::Registry;
use crate::relocation::Relocator;
use crate::store::InsertOutcome;
use crate::{LoaderError, Result};

/// What reading one file produced
#[derive(Debug, Clone)]
pub struct ContainerRead {
    /// File name
    pub name: String,
    /// Decoded header record
    pub header: FileHeader,
    /// Records stored in the registry
    pub relevant: u64,
}

/// Read the file at `path` into `registry`
///
/// With a relocator and `config.relocate` set, the relocator is re-seeded
/// for this file from its header and every identifier is rewritten to the
/// global load order before it is stored. Top-level groups for tags
/// outside `config.wanted_tags` are skipped without being read.
///
/// # Errors
///
/// Any failure is returned as [`LoaderError::File`] naming the path and
/// the stream position reached.
pub fn read_container<P: AsRef<Path>>(
    path: P,
    registry: &mut Registry,
    relocator: Option<&mut Relocator>,
    config: &LoadConfig,
) -> Result<ContainerRead> {
    let path = path.as_ref();
    let name = plugin_name(path)?;
    let wanted = config.wanted_tag_set()?;

    let file = File::open(path).map_err(|e| LoaderError::from(e).in_file(path, 0))?;
    let mut reader = BufReader::new(file);
    debug!("Opened {}", path.display());

    let header =
        FileHeader::read(&mut reader).map_err(|e| LoaderError::from(e).in_file(path, 0))?;

    let relocator = match relocator {
        Some(relocator) if config.relocate => {
            relocator
                .prepare(&name, header.master_names())
                .map_err(|e| e.in_file(path, 0))?;
            Some(&*relocator)
        }
        _ => None,
    };

    let table = dispatch_table(wanted.as_ref());
    let mut filler = StoreFiller {
        relocator,
        wanted,
        decompress: config.decompress_records,
        owners: Vec::new(),
        staged: Vec::new(),
    };

    let relevant = match ContainerWalker::new(&table).walk_groups(&mut reader, &mut filler) {
        Ok(relevant) => relevant,
        Err(e) => {
            let offset = reader.stream_position().unwrap_or(0);
            debug!(
                "Dropping {} staged records from {}",
                filler.staged.len(),
                name
            );
            return Err(e.in_file(path, offset));
        }
    };

    let replaced = merge(registry, filler.staged);
    info!(
        "Read {}: {} records ({} overrides), {} masters",
        name,
        relevant,
        replaced,
        header.masters.len()
    );
    Ok(ContainerRead {
        name,
        header,
        relevant,
    })
}

/// Handlers for the wanted tags, or one fallback for every tag
fn dispatch_table<'r>(wanted: Option<&HashSet<Tag>>) -> DispatchTable<StoreFiller<'r>> {
    match wanted {
        Some(tags) => {
            let mut table = DispatchTable::new();
            for &tag in tags {
                table.register(tag, store_record);
            }
            table
        }
        None => DispatchTable::with_fallback(store_record),
    }
}

/// Collects one file's records; nothing reaches the registry until the
/// whole file has been walked
struct StoreFiller<'r> {
    relocator: Option<&'r Relocator>,
    wanted: Option<HashSet<Tag>>,
    decompress: bool,
    /// Owning entity of each open group, innermost last
    owners: Vec<Option<FormId>>,
    /// Relocated records with their owner, in file order
    staged: Vec<(Record, Option<FormId>)>,
}

impl StoreFiller<'_> {
    fn relocate(&self, form_id: FormId) -> Result<FormId> {
        match self.relocator {
            Some(relocator) if !form_id.is_null() => relocator.relocate(form_id),
            _ => Ok(form_id),
        }
    }
}

impl ContainerVisitor for StoreFiller<'_> {
    type Error = LoaderError;

    fn wants_group(&mut self, header: &GroupHeader) -> bool {
        match (&self.wanted, header.group_type) {
            (Some(wanted), GroupType::TopLevel) => wanted.contains(&header.label_tag()),
            _ => true,
        }
    }

    fn group_started(&mut self, header: &GroupHeader, _depth: usize) -> Result<()> {
        let owner = header.label_form_id().map(|id| self.relocate(id)).transpose()?;
        self.owners.push(owner);
        Ok(())
    }

    fn group_finished(&mut self, _header: &GroupHeader, _depth: usize) -> Result<()> {
        self.owners.pop();
        Ok(())
    }

    fn group_skipped(&mut self, header: &GroupHeader, offset: u64) {
        trace!(
            "Skipped group {} at {:#x} ({} bytes)",
            header.label_tag(),
            offset,
            header.size
        );
    }
}

fn store_record(filler: &mut StoreFiller<'_>, mut record: Record) -> Result<RecordOutcome> {
    let id = filler.relocate(record.form_id())?;
    record.set_form_id(id);

    if filler.decompress && record.is_compressed() {
        record.decompress_in_place()?;
    } else {
        record.verify_payload()?;
    }

    if id.is_null() {
        return Ok(RecordOutcome::Ignored);
    }
    let owner = filler.owners.last().copied().flatten();
    filler.staged.push((record, owner));
    Ok(RecordOutcome::Relevant)
}

/// Move staged records into `registry`, returning how many replaced an
/// earlier version
fn merge(registry: &mut Registry, staged: Vec<(Record, Option<FormId>)>) -> u64 {
    let mut replaced = 0;
    for (record, owner) in staged {
        if let Some(owner) = owner {
            registry.set_owner(record.form_id(), owner);
        }
        if registry.insert(record) == InsertOutcome::Replaced {
            replaced += 1;
        }
    }
    replaced
}
