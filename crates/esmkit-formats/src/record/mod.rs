//! Generic records: a header plus an opaque payload
//!
//! The payload is kept exactly as stored, compressed or not, so that an
//! unmodified record writes back byte for byte. Field-level access inflates
//! on demand.

pub mod field;
pub mod header;

pub use field::{Field, parse_fields, write_fields};
pub use header::{
    FLAG_COMPRESSED, FLAG_DELETED, FLAG_IGNORED, FLAG_LOCALIZED, FLAG_MASTER, RecordHeader,
};

use std::borrow::Cow;
use std::io::{Read, Write};

use binrw::{BinRead, BinWrite};

use crate::compression::{decode_record_payload, encode_record_payload};
use crate::error::{FormatError, FormatResult};
use crate::form_id::FormId;
use crate::tag::Tag;

/// A record with its raw payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    header: RecordHeader,
    payload: Vec<u8>,
}

impl Record {
    /// Create a record from a header and its stored payload
    ///
    /// The header's `size` is replaced by the payload length.
    pub fn new(mut header: RecordHeader, payload: Vec<u8>) -> FormatResult<Self> {
        header.size = payload_len(&payload)?;
        Ok(Self { header, payload })
    }

    /// Create a record from fields, optionally compressing the payload
    pub fn from_fields(
        header: RecordHeader,
        fields: &[Field],
        compress: bool,
    ) -> FormatResult<Self> {
        let mut record = Self::new(header, write_fields(fields)?)?;
        record.header.set_flag(FLAG_COMPRESSED, false);
        if compress {
            record.compress_in_place()?;
        }
        Ok(record)
    }

    /// Read the payload following an already-decoded header
    pub fn read_body<R: Read>(header: RecordHeader, reader: &mut R) -> FormatResult<Self> {
        let mut payload = vec![0u8; header.size as usize];
        reader.read_exact(&mut payload)?;
        Ok(Self { header, payload })
    }

    /// Read a header and payload
    pub fn read<R: Read + binrw::io::Seek>(reader: &mut R) -> FormatResult<Self> {
        let header = RecordHeader::read(reader)?;
        Self::read_body(header, reader)
    }

    /// Write header and payload
    pub fn write<W: Write + binrw::io::Seek>(&self, writer: &mut W) -> FormatResult<()> {
        self.header.write(writer)?;
        writer.write_all(&self.payload)?;
        Ok(())
    }

    /// Append the encoded record to a byte buffer
    pub fn write_to_vec(&self, out: &mut Vec<u8>) -> FormatResult<()> {
        let mut cursor = std::io::Cursor::new(Vec::with_capacity(RecordHeader::SIZE));
        self.header.write(&mut cursor)?;
        out.extend_from_slice(&cursor.into_inner());
        out.extend_from_slice(&self.payload);
        Ok(())
    }

    /// Header
    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// Record type
    pub fn tag(&self) -> Tag {
        self.header.tag
    }

    /// Record identifier
    pub fn form_id(&self) -> FormId {
        self.header.form_id
    }

    /// Replace the record identifier
    pub fn set_form_id(&mut self, form_id: FormId) {
        self.header.form_id = form_id;
    }

    /// Set or clear a header flag other than [`FLAG_COMPRESSED`]
    ///
    /// Compression changes the payload and goes through
    /// [`Record::compress_in_place`] and [`Record::decompress_in_place`].
    pub fn set_flag(&mut self, flag: u32, enabled: bool) {
        let flag = flag & !FLAG_COMPRESSED;
        self.header.set_flag(flag, enabled);
    }

    /// Stored payload, compressed if the record is
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether the stored payload is compressed
    pub fn is_compressed(&self) -> bool {
        self.header.is_compressed()
    }

    /// Uncompressed payload
    pub fn decompressed(&self) -> FormatResult<Cow<'_, [u8]>> {
        if self.is_compressed() {
            Ok(Cow::Owned(decode_record_payload(&self.payload)?))
        } else {
            Ok(Cow::Borrowed(&self.payload))
        }
    }

    /// Check that a compressed payload inflates to its declared length
    pub fn verify_payload(&self) -> FormatResult<()> {
        self.decompressed().map(|_| ())
    }

    /// Replace a compressed payload with its inflated form
    pub fn decompress_in_place(&mut self) -> FormatResult<()> {
        if !self.is_compressed() {
            return Ok(());
        }
        let inflated = decode_record_payload(&self.payload)?;
        self.header.size = payload_len(&inflated)?;
        self.header.set_flag(FLAG_COMPRESSED, false);
        self.payload = inflated;
        Ok(())
    }

    /// Compress the payload if it is not already
    pub fn compress_in_place(&mut self) -> FormatResult<()> {
        if self.is_compressed() {
            return Ok(());
        }
        let compressed = encode_record_payload(&self.payload)?;
        self.header.size = payload_len(&compressed)?;
        self.header.set_flag(FLAG_COMPRESSED, true);
        self.payload = compressed;
        Ok(())
    }

    /// Fields of the uncompressed payload
    pub fn fields(&self) -> FormatResult<Vec<Field>> {
        parse_fields(self.tag(), &self.decompressed()?)
    }

    /// Replace the payload with `fields`, keeping the compression state
    pub fn set_fields(&mut self, fields: &[Field]) -> FormatResult<()> {
        let compress = self.is_compressed();
        self.payload = write_fields(fields)?;
        self.header.size = payload_len(&self.payload)?;
        self.header.set_flag(FLAG_COMPRESSED, false);
        if compress {
            self.compress_in_place()?;
        }
        Ok(())
    }

    /// Bytes this record occupies on disk: header plus stored payload
    pub fn written_size(&self) -> usize {
        RecordHeader::SIZE + self.payload.len()
    }

    /// Same identity and flags, equal uncompressed content
    ///
    /// Two copies of a record that differ only in whether they were stored
    /// compressed compare equal.
    pub fn same_content(&self, other: &Self) -> bool {
        let strip = |h: &RecordHeader| RecordHeader {
            size: 0,
            flags: h.flags & !FLAG_COMPRESSED,
            ..*h
        };
        if strip(&self.header) != strip(&other.header) {
            return false;
        }
        match (self.decompressed(), other.decompressed()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

fn payload_len(payload: &[u8]) -> FormatResult<u32> {
    u32::try_from(payload.len()).map_err(|_| FormatError::TooLarge {
        what: "record payload",
        size: payload.len(),
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn weapon() -> RecordHeader {
        RecordHeader::new(Tag::new(*b"WEAP"), FormId::new(0x0001_0F00))
    }

    fn sample_fields() -> Vec<Field> {
        vec![
            Field::from_zstring(Tag::new(*b"EDID"), "IronSword"),
            Field::new(Tag::DATA, vec![0x42; 300]),
        ]
    }

    #[test]
    fn test_size_follows_payload() {
        let record = Record::from_fields(weapon(), &sample_fields(), false)
            .expect("Test operation should succeed");
        assert_eq!(record.header().size as usize, 6 + 10 + 6 + 300);
        assert_eq!(record.written_size(), 24 + 6 + 10 + 6 + 300);
    }

    #[test]
    fn test_compressed_record_fields() {
        let record = Record::from_fields(weapon(), &sample_fields(), true)
            .expect("Test operation should succeed");
        assert!(record.is_compressed());
        assert!(record.payload().len() < 322);
        assert_eq!(
            &record.payload()[..4],
            &322u32.to_le_bytes(),
            "uncompressed length prefix"
        );
        assert_eq!(record.fields().expect("Test operation should succeed"), sample_fields());
    }

    #[test]
    fn test_decompress_in_place() {
        let mut record = Record::from_fields(weapon(), &sample_fields(), true)
            .expect("Test operation should succeed");
        let compressed = record.clone();

        record.decompress_in_place().expect("Test operation should succeed");
        assert!(!record.is_compressed());
        assert_eq!(record.header().size, 322);
        assert!(record.same_content(&compressed));
        assert_ne!(record, compressed);
    }

    #[test]
    fn test_read_write_round_trip() {
        let record = Record::from_fields(weapon(), &sample_fields(), true)
            .expect("Test operation should succeed");

        let mut bytes = Vec::new();
        record.write_to_vec(&mut bytes).expect("Test operation should succeed");
        assert_eq!(bytes.len(), record.written_size());

        let parsed = Record::read(&mut Cursor::new(&bytes)).expect("Test operation should succeed");
        assert_eq!(parsed, record);

        let mut rewritten = Cursor::new(Vec::new());
        parsed.write(&mut rewritten).expect("Test operation should succeed");
        assert_eq!(rewritten.into_inner(), bytes);
    }

    #[test]
    fn test_bad_compressed_payload_fails_verification() {
        let mut header = weapon();
        header.set_flag(FLAG_COMPRESSED, true);
        let mut payload = 100u32.to_le_bytes().to_vec();
        payload.extend_from_slice(&crate::compression::compress(b"only 17 bytes ...", crate::compression::Codec::Deflate).unwrap());
        let record = Record::new(header, payload).expect("Test operation should succeed");

        assert!(matches!(
            record.verify_payload(),
            Err(FormatError::SizeMismatch { expected: 100, actual: 17 })
        ));
    }

    #[test]
    fn test_set_flag_leaves_compression_alone() {
        let mut record = Record::from_fields(weapon(), &sample_fields(), false)
            .expect("Test operation should succeed");
        record.set_flag(FLAG_DELETED | FLAG_COMPRESSED, true);
        assert!(record.header().is_deleted());
        assert!(!record.is_compressed());
    }
}
