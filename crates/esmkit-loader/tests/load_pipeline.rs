//! End-to-end loading of several files from a data directory

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use esmkit_formats::{
    Field, FileHeader, FormId, Group, GroupHeader, GroupType, MasterFile, Record, RecordHeader,
    Tag,
};
use esmkit_loader::{
    FileDescriptor, LoadConfig, LoadOrder, LoadSession, LoaderError, Registry, Relocator,
    read_container, solve_load_order, write_container, write_registry,
};
use pretty_assertions::assert_eq;
use tracing_subscriber::EnvFilter;

const CELL: Tag = Tag::new(*b"CELL");
const REFR: Tag = Tag::new(*b"REFR");
const NPC: Tag = Tag::new(*b"NPC_");

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn record(tag: Tag, id: u32, name: &str) -> Record {
    Record::from_fields(
        RecordHeader::new(tag, FormId::new(id)),
        &[Field::from_zstring(Tag::new(*b"EDID"), name)],
        false,
    )
    .unwrap()
}

fn write_file(dir: &Path, name: &str, masters: &[&str], groups: Vec<Group>) {
    let mut header = FileHeader::new("pipeline");
    header.masters = masters.iter().map(|m| MasterFile::new(*m)).collect();
    let mut groups = groups;
    write_container(dir.join(name), &mut header, &mut groups).unwrap();
}

fn npc_group(records: &[(u32, &str)]) -> Group {
    let mut group = Group::top_level(NPC);
    for &(id, name) in records {
        group.add_record(record(NPC, id, name));
    }
    group
}

/// Skyrim.esm <- Update.esm <- Mod.esp, with Mod.esp listing its masters
/// in reverse load order
fn write_data_dir(dir: &Path) {
    write_file(dir, "Skyrim.esm", &[], vec![npc_group(&[(0x0000_0007, "Player")])]);
    write_file(
        dir,
        "Update.esm",
        &["Skyrim.esm"],
        vec![npc_group(&[(0x0000_0007, "PlayerFixed"), (0x0100_0800, "Courier")])],
    );

    // Mod.esp frame: 0 = Update, 1 = Skyrim, 2 = itself
    let mut cells = Group::top_level(CELL);
    let cell = FormId::new(0x0200_0900);
    cells.add_record(record(CELL, cell.get(), "ModCell"));
    let children = cells.add_group(GroupHeader::children_of(cell, GroupType::CellChildren));
    children.add_record(record(REFR, 0x0200_0901, "Chair"));
    write_file(
        dir,
        "Mod.esp",
        &["Update.esm", "Skyrim.esm"],
        vec![npc_group(&[(0x0000_0800, "CourierRenamed"), (0x0200_0902, "Bandit")]), cells],
    );
}

fn edid(registry: &Registry, id: u32) -> String {
    registry.find(FormId::new(id)).unwrap().fields().unwrap()[0]
        .as_zstring()
        .unwrap()
}

#[test]
fn session_relocates_into_the_global_order() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_data_dir(dir.path());

    let mut session = LoadSession::new(LoadConfig::new(dir.path()));
    let report = session
        .load_all(&["Mod.esp", "Update.esm", "Skyrim.esm"])
        .expect("Test operation should succeed");
    assert_eq!(report.load_order.names(), ["Skyrim.esm", "Update.esm", "Mod.esp"]);

    let registry = session.registry();
    assert_eq!(edid(registry, 0x0000_0007), "PlayerFixed");
    assert_eq!(edid(registry, 0x0100_0800), "CourierRenamed");
    assert_eq!(edid(registry, 0x0200_0902), "Bandit");
    assert_eq!(
        registry.owner(FormId::new(0x0200_0901)),
        Some(FormId::new(0x0200_0900))
    );
    // nothing was stored under a local-frame identifier
    assert!(registry.find(FormId::new(0x0000_0800)).is_none());
    assert_eq!(registry.record_count(), 5);
}

#[test]
fn wanted_tags_limit_what_is_stored() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_data_dir(dir.path());

    let config = LoadConfig::new(dir.path()).with_wanted_tags(["CELL", "REFR"]);
    let mut session = LoadSession::new(config);
    let report = session
        .load_all(&["Skyrim.esm", "Update.esm", "Mod.esp"])
        .unwrap();

    let counts: Vec<(Tag, usize)> = session.registry().counts();
    assert_eq!(counts, [(CELL, 1), (REFR, 1)]);
    assert_eq!(report.total_relevant(), 2);
}

#[test]
fn peek_needs_only_the_header() {
    let dir = tempfile::tempdir().unwrap();
    write_data_dir(dir.path());

    // corrupt everything after the header record
    let path = dir.path().join("Mod.esp");
    let mut bytes = std::fs::read(&path).unwrap();
    let mut header = FileHeader::new("pipeline");
    header.masters = vec![MasterFile::new("Update.esm"), MasterFile::new("Skyrim.esm")];
    let header_len = header.written_size();
    for byte in &mut bytes[header_len..] {
        *byte = 0xEE;
    }
    std::fs::write(&path, &bytes).unwrap();

    let descriptor = FileDescriptor::peek(&path).unwrap();
    assert_eq!(
        descriptor.master_names().collect::<Vec<_>>(),
        ["Update.esm", "Skyrim.esm"]
    );

    let mut registry = Registry::new();
    let err = read_container(&path, &mut registry, None, &LoadConfig::default()).unwrap_err();
    assert!(matches!(err.root(), LoaderError::Format(_)));
}

#[test]
fn merged_registry_reads_back_unchanged() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_data_dir(dir.path());

    let mut session = LoadSession::new(LoadConfig::new(dir.path()));
    let report = session
        .load_all(&["Skyrim.esm", "Update.esm", "Mod.esp"])
        .unwrap();
    let merged = session.into_registry();

    // identifiers are already global, so the merged file lists the whole
    // order as masters and relocation becomes the identity
    let mut header = FileHeader::new("merger");
    header.masters = report
        .load_order
        .names()
        .iter()
        .map(|name| MasterFile::new(name.as_str()))
        .collect();
    let out = dir.path().join("Merged.esp");
    write_registry(&out, &mut header, &merged).unwrap();

    let mut names: Vec<&str> = report.load_order.names().iter().map(String::as_str).collect();
    names.push("Merged.esp");
    let mut relocator = Relocator::new(LoadOrder::from_names(names));
    let mut reread = Registry::new();
    let read = read_container(&out, &mut reread, Some(&mut relocator), &LoadConfig::default())
        .unwrap();

    // the children group is flattened into a top-level REFR group
    assert_eq!(read.relevant, 5);
    assert_eq!(reread.counts(), merged.counts());
    for tag in merged.tags() {
        let original = merged.store(tag).unwrap();
        let copy = reread.store(tag).unwrap();
        for record in original {
            assert!(copy.get(record.form_id()).unwrap().same_content(record));
        }
    }
}

#[test]
fn solver_and_relocator_agree_on_indices() {
    let descriptors = [
        FileDescriptor::new("Mod.esp", ["Update.esm", "Skyrim.esm"]),
        FileDescriptor::new("Skyrim.esm", Vec::<String>::new()),
        FileDescriptor::new("Update.esm", ["Skyrim.esm"]),
    ];
    let order = solve_load_order(&descriptors).unwrap();
    let mut relocator = Relocator::new(order.clone());
    relocator
        .prepare("Mod.esp", ["Update.esm", "Skyrim.esm"])
        .unwrap();

    for local in 0..3u8 {
        let global = relocator.mapping(local).unwrap();
        let expected = match local {
            0 => "Update.esm",
            1 => "Skyrim.esm",
            _ => "Mod.esp",
        };
        assert_eq!(order.name_at(global), Some(expected));
    }
    assert_eq!(
        order.describe(relocator.relocate(FormId::new(0x0200_0902)).unwrap(), true),
        "xx000902 (file: Mod.esp)"
    );
}

#[test]
fn abandoned_file_leaves_no_records_behind() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "Base.esm", &[], vec![npc_group(&[(0x0000_0800, "Original")])]);

    // the override sits in a group that reads fine; the file breaks later
    let mut cells = Group::top_level(CELL);
    cells.add_record(record(CELL, 0x0100_0900, "BrokenCell"));
    write_file(
        dir.path(),
        "Broken.esp",
        &["Base.esm"],
        vec![npc_group(&[(0x0000_0800, "Overridden"), (0x0100_0801, "Stray")]), cells],
    );
    let path = dir.path().join("Broken.esp");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.truncate(bytes.len() - 3);
    std::fs::write(&path, &bytes).unwrap();

    let mut session = LoadSession::new(LoadConfig::new(dir.path()).with_stop_on_error(false));
    let report = session.load_all(&["Base.esm", "Broken.esp"]).unwrap();

    let failed: Vec<&str> = report.failures.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(failed, ["Broken.esp"]);
    assert_eq!(report.files.len(), 1);

    let registry = session.registry();
    assert_eq!(edid(registry, 0x0000_0800), "Original");
    assert!(registry.find(FormId::new(0x0100_0801)).is_none());
    assert!(registry.find(FormId::new(0x0100_0900)).is_none());
    assert_eq!(registry.record_count(), 1);
}
