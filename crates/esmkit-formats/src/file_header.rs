//! The mandatory leading `TES4` record
//!
//! Field order on disk:
//!
//! | Field | Occurs | Content |
//! |-------|--------|---------|
//! | `HEDR` | once, first | `f32` version, `u32` record and group count, `u32` next object id |
//! | `CNAM` | once, right after `HEDR` | author |
//! | `SNAM` | optional | summary |
//! | `MAST` + `DATA` | any number of pairs | master file name, 8 opaque bytes |
//! | `ONAM` | optional | overridden identifiers |
//! | `INTV` | once | internal value |
//! | `INCC` | optional | internal counter |

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite};

use crate::error::{FormatError, FormatResult};
use crate::form_id::FormId;
use crate::record::{
    FLAG_LOCALIZED, FLAG_MASTER, Field, Record, RecordHeader, field::FIELD_HEADER_SIZE,
};
use crate::tag::Tag;

const HEDR_SIZE: usize = 12;
const MASTER_DATA_SIZE: usize = 8;

/// Payload of the `HEDR` field
#[derive(Debug, Clone, Copy, PartialEq, BinRead, BinWrite)]
#[brw(little)]
struct HeaderData {
    version: f32,
    record_count: u32,
    next_object_id: u32,
}

/// Position of a field in the on-disk order after `CNAM`
fn field_rank(tag: Tag) -> u8 {
    match tag {
        Tag::SNAM => 1,
        Tag::MAST => 2,
        Tag::ONAM => 3,
        Tag::INTV => 4,
        Tag::INCC => 5,
        _ => u8::MAX,
    }
}

/// One declared master file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterFile {
    /// File name as declared
    pub name: String,
    /// Opaque value stored in the `DATA` field after the name
    pub data: u64,
}

impl MasterFile {
    /// Master entry with zeroed data
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: 0,
        }
    }
}

/// Decoded file header record
#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    /// Header of the `TES4` record itself (flags, revision, version)
    ///
    /// `size` is kept at zero and recomputed on write.
    pub record: RecordHeader,
    /// Format version
    pub version: f32,
    /// Number of records and groups in the file
    pub record_count: u32,
    /// Next free object index
    pub next_object_id: u32,
    /// Author
    pub author: String,
    /// Optional summary
    pub summary: Option<String>,
    /// Declared masters in declaration order
    pub masters: Vec<MasterFile>,
    /// Records of masters overridden by this file
    pub overrides: Vec<FormId>,
    /// Internal value
    pub internal_value: u32,
    /// Optional internal counter
    pub incc: Option<u32>,
}

impl FileHeader {
    /// Header for a new, empty plugin
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            record: RecordHeader::new(Tag::TES4, FormId::NULL),
            version: 1.7,
            record_count: 0,
            next_object_id: 0x800,
            author: author.into(),
            summary: None,
            masters: Vec::new(),
            overrides: Vec::new(),
            internal_value: 1,
            incc: None,
        }
    }

    /// Whether the master flag is set
    pub fn is_master(&self) -> bool {
        self.record.has_flag(FLAG_MASTER)
    }

    /// Whether text fields are stored in external string tables
    pub fn is_localized(&self) -> bool {
        self.record.has_flag(FLAG_LOCALIZED)
    }

    /// Master names in declaration order
    pub fn master_names(&self) -> impl Iterator<Item = &str> {
        self.masters.iter().map(|m| m.name.as_str())
    }

    /// Decode from a `TES4` record
    pub fn from_record(record: &Record) -> FormatResult<Self> {
        if record.tag() != Tag::TES4 {
            return Err(FormatError::UnexpectedTag {
                offset: 0,
                expected: Tag::TES4,
                found: record.tag(),
            });
        }
        let mut fields = record.fields()?.into_iter();

        let hedr = fields.next().ok_or(FormatError::MissingField {
            record: Tag::TES4,
            field: Tag::HEDR,
        })?;
        if hedr.tag != Tag::HEDR {
            return Err(invalid(hedr.tag, "file header must start with HEDR"));
        }
        if hedr.data.len() != HEDR_SIZE {
            return Err(invalid(
                Tag::HEDR,
                &format!("expected 12 bytes, found {}", hedr.data.len()),
            ));
        }
        let data = HeaderData::read(&mut Cursor::new(&hedr.data))?;

        let author = match fields.next() {
            Some(field) if field.tag == Tag::CNAM => field.as_zstring()?,
            _ => {
                return Err(FormatError::MissingField {
                    record: Tag::TES4,
                    field: Tag::CNAM,
                });
            }
        };

        let mut header = Self {
            record: RecordHeader {
                size: 0,
                ..*record.header()
            },
            version: data.version,
            record_count: data.record_count,
            next_object_id: data.next_object_id,
            author,
            summary: None,
            masters: Vec::new(),
            overrides: Vec::new(),
            internal_value: 0,
            incc: None,
        };
        let mut seen_intv = false;
        let mut seen_onam = false;
        let mut last_rank = 0;

        while let Some(field) = fields.next() {
            let rank = field_rank(field.tag);
            if rank < last_rank {
                return Err(invalid(field.tag, "field out of order in file header"));
            }
            last_rank = rank;
            match field.tag {
                Tag::SNAM => {
                    if header.summary.is_some() {
                        return Err(duplicate(Tag::SNAM));
                    }
                    if field.data.is_empty() {
                        return Err(invalid(Tag::SNAM, "summary is empty"));
                    }
                    header.summary = Some(field.as_zstring()?);
                }
                Tag::MAST => {
                    let name = field.as_zstring()?;
                    let data = match fields.next() {
                        Some(data) if data.tag == Tag::DATA => data,
                        _ => {
                            return Err(FormatError::MissingField {
                                record: Tag::TES4,
                                field: Tag::DATA,
                            });
                        }
                    };
                    let bytes: [u8; MASTER_DATA_SIZE] =
                        data.data.as_slice().try_into().map_err(|_| {
                            invalid(
                                Tag::DATA,
                                &format!("expected 8 bytes, found {}", data.data.len()),
                            )
                        })?;
                    header.masters.push(MasterFile {
                        name,
                        data: u64::from_le_bytes(bytes),
                    });
                }
                Tag::ONAM => {
                    if seen_onam {
                        return Err(duplicate(Tag::ONAM));
                    }
                    if field.data.is_empty() || field.data.len() % 4 != 0 {
                        return Err(invalid(
                            Tag::ONAM,
                            &format!("length {} is not a non-zero multiple of 4", field.data.len()),
                        ));
                    }
                    seen_onam = true;
                    header.overrides = field
                        .data
                        .chunks_exact(4)
                        .map(|c| FormId::new(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                        .collect();
                }
                Tag::INTV => {
                    if seen_intv {
                        return Err(duplicate(Tag::INTV));
                    }
                    seen_intv = true;
                    header.internal_value = field.as_u32(Tag::TES4)?;
                }
                Tag::INCC => {
                    if header.incc.is_some() {
                        return Err(duplicate(Tag::INCC));
                    }
                    header.incc = Some(field.as_u32(Tag::TES4)?);
                }
                other => return Err(invalid(other, "unexpected field in file header")),
            }
        }

        if !seen_intv {
            return Err(FormatError::MissingField {
                record: Tag::TES4,
                field: Tag::INTV,
            });
        }
        Ok(header)
    }

    /// Fields in on-disk order
    pub fn to_fields(&self) -> FormatResult<Vec<Field>> {
        let mut hedr = Cursor::new(Vec::with_capacity(HEDR_SIZE));
        HeaderData {
            version: self.version,
            record_count: self.record_count,
            next_object_id: self.next_object_id,
        }
        .write(&mut hedr)?;

        let mut fields = vec![
            Field::new(Tag::HEDR, hedr.into_inner()),
            Field::from_zstring(Tag::CNAM, &self.author),
        ];
        if let Some(summary) = &self.summary {
            fields.push(Field::from_zstring(Tag::SNAM, summary));
        }
        for master in &self.masters {
            fields.push(Field::from_zstring(Tag::MAST, &master.name));
            fields.push(Field::new(Tag::DATA, master.data.to_le_bytes()));
        }
        if !self.overrides.is_empty() {
            let data: Vec<u8> = self
                .overrides
                .iter()
                .flat_map(|id| id.get().to_le_bytes())
                .collect();
            fields.push(Field::new(Tag::ONAM, data));
        }
        fields.push(Field::from_u32(Tag::INTV, self.internal_value));
        if let Some(incc) = self.incc {
            fields.push(Field::from_u32(Tag::INCC, incc));
        }
        Ok(fields)
    }

    /// Encode as an uncompressed `TES4` record
    pub fn to_record(&self) -> FormatResult<Record> {
        let mut header = self.record;
        header.tag = Tag::TES4;
        Record::from_fields(header, &self.to_fields()?, false)
    }

    /// Bytes the encoded record occupies, header included
    pub fn written_size(&self) -> usize {
        let strings = |s: &str| FIELD_HEADER_SIZE + s.len() + 1;
        let mut size = RecordHeader::SIZE + FIELD_HEADER_SIZE + HEDR_SIZE + strings(&self.author);
        if let Some(summary) = &self.summary {
            size += strings(summary);
        }
        for master in &self.masters {
            size += strings(&master.name) + FIELD_HEADER_SIZE + MASTER_DATA_SIZE;
        }
        if !self.overrides.is_empty() {
            size += FIELD_HEADER_SIZE + 4 * self.overrides.len();
        }
        size += FIELD_HEADER_SIZE + 4;
        if self.incc.is_some() {
            size += FIELD_HEADER_SIZE + 4;
        }
        size
    }

    /// Read the leading record of a stream and decode it
    ///
    /// On success the reader is positioned at the first group.
    pub fn read<R: Read + Seek>(reader: &mut R) -> FormatResult<Self> {
        let start = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(start))?;

        let available = end - start;
        if available < RecordHeader::SIZE as u64 {
            return Err(FormatError::Truncated {
                offset: start,
                needed: RecordHeader::SIZE as u64,
                available,
            });
        }
        let header = RecordHeader::read(reader)?;
        if header.tag != Tag::TES4 {
            return Err(FormatError::UnexpectedTag {
                offset: start,
                expected: Tag::TES4,
                found: header.tag,
            });
        }
        let body_available = available - RecordHeader::SIZE as u64;
        if u64::from(header.size) > body_available {
            return Err(FormatError::Truncated {
                offset: start + RecordHeader::SIZE as u64,
                needed: u64::from(header.size),
                available: body_available,
            });
        }
        Self::from_record(&Record::read_body(header, reader)?)
    }

    /// Encode and write the record
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> FormatResult<()> {
        self.to_record()?.write(writer)
    }
}

fn invalid(field: Tag, reason: &str) -> FormatError {
    FormatError::InvalidField {
        record: Tag::TES4,
        field,
        reason: reason.to_string(),
    }
}

fn duplicate(field: Tag) -> FormatError {
    FormatError::DuplicateField {
        record: Tag::TES4,
        field,
    }
}
