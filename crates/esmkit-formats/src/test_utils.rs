//! Test utilities for building synthetic container bytes
//!
//! The builders write raw bytes directly rather than going through the
//! library's own writers, so parser tests do not depend on the code they
//! check.

use crate::EsmFormat;
use crate::group::GroupType;
use crate::tag::Tag;
use std::fmt::Debug;

/// Raw bytes of an uncompressed record
pub fn record_bytes(tag: Tag, form_id: u32, payload: &[u8]) -> Vec<u8> {
    record_bytes_with_flags(tag, form_id, 0, payload)
}

/// Raw bytes of a record with explicit flags
pub fn record_bytes_with_flags(tag: Tag, form_id: u32, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(24 + payload.len());
    out.extend_from_slice(tag.as_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&form_id.to_le_bytes());
    out.extend_from_slice(&[0; 8]); // revision, version, unknown
    out.extend_from_slice(payload);
    out
}

/// Raw bytes of a group wrapping an already encoded body
pub fn group_bytes(label: u32, group_type: GroupType, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(24 + body.len());
    out.extend_from_slice(b"GRUP");
    out.extend_from_slice(&(24 + body.len() as u32).to_le_bytes());
    out.extend_from_slice(&label.to_le_bytes());
    out.extend_from_slice(&group_type.as_u32().to_le_bytes());
    out.extend_from_slice(&[0; 8]); // stamp, unknown
    out.extend_from_slice(body);
    out
}

/// Raw bytes of a field
pub fn field_bytes(tag: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(6 + data.len());
    out.extend_from_slice(tag);
    out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    out.extend_from_slice(data);
    out
}

/// Raw bytes of a minimal `TES4` record declaring `masters`
pub fn file_header_bytes(masters: &[&str]) -> Vec<u8> {
    let mut payload = Vec::new();
    let mut hedr = Vec::new();
    hedr.extend_from_slice(&1.7f32.to_le_bytes());
    hedr.extend_from_slice(&0u32.to_le_bytes());
    hedr.extend_from_slice(&0x800u32.to_le_bytes());
    payload.extend(field_bytes(b"HEDR", &hedr));
    payload.extend(field_bytes(b"CNAM", b"tester\0"));
    for master in masters {
        let mut name = master.as_bytes().to_vec();
        name.push(0);
        payload.extend(field_bytes(b"MAST", &name));
        payload.extend(field_bytes(b"DATA", &[0; 8]));
    }
    payload.extend(field_bytes(b"INTV", &1u32.to_le_bytes()));
    record_bytes(Tag::TES4, 0, &payload)
}

/// Test round-trip with existing binary data
///
/// Parses, rebuilds, and verifies the rebuilt bytes are identical.
pub fn test_round_trip_with_data<T>(data: &[u8]) -> Result<T, Box<dyn std::error::Error>>
where
    T: EsmFormat + PartialEq + Debug,
{
    let parsed = T::parse(data)?;
    let rebuilt = parsed.build()?;
    if rebuilt != data {
        return Err(format!(
            "Round-trip produced different bytes: {} in, {} out",
            data.len(),
            rebuilt.len()
        )
        .into());
    }

    let reparsed = T::parse(&rebuilt)?;
    if parsed != reparsed {
        return Err(format!(
            "Round-trip with data failed:\nParsed: {:?}\nReparsed: {:?}",
            parsed, reparsed
        )
        .into());
    }
    Ok(parsed)
}
