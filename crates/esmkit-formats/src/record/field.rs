//! Tagged fields (sub-records) inside a record payload
//!
//! Each field is `tag(4) length(2) data`. Data longer than `u16::MAX` is
//! announced by a preceding `XXXX` field of length 4 holding the real size
//! as a `u32`; the announced field then carries a length of zero.

use crate::error::{FormatError, FormatResult};
use crate::tag::Tag;

/// Bytes of tag plus length preceding field data
pub const FIELD_HEADER_SIZE: usize = 6;

/// A single field of a record payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field type
    pub tag: Tag,
    /// Raw field data
    pub data: Vec<u8>,
}

impl Field {
    /// Create a field
    pub fn new(tag: Tag, data: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            data: data.into(),
        }
    }

    /// Field holding a little-endian `u32`
    pub fn from_u32(tag: Tag, value: u32) -> Self {
        Self::new(tag, value.to_le_bytes())
    }

    /// Field holding a NUL-terminated string
    pub fn from_zstring(tag: Tag, value: &str) -> Self {
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        Self::new(tag, data)
    }

    /// Whether the field needs an `XXXX` size prefix
    pub fn needs_size_prefix(&self) -> bool {
        self.data.len() > usize::from(u16::MAX)
    }

    /// Encoded size, including the `XXXX` prefix when one is needed
    pub fn written_size(&self) -> usize {
        let prefix = if self.needs_size_prefix() {
            FIELD_HEADER_SIZE + 4
        } else {
            0
        };
        prefix + FIELD_HEADER_SIZE + self.data.len()
    }

    /// Interpret the data as a `u32`, which requires exactly four bytes
    pub fn as_u32(&self, record: Tag) -> FormatResult<u32> {
        let bytes: [u8; 4] =
            self.data
                .as_slice()
                .try_into()
                .map_err(|_| FormatError::InvalidField {
                    record,
                    field: self.tag,
                    reason: format!("expected 4 bytes, found {}", self.data.len()),
                })?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Interpret the data as a NUL-terminated UTF-8 string
    ///
    /// The terminator must be the final byte and the only NUL.
    pub fn as_zstring(&self) -> FormatResult<String> {
        let Some((&0, text)) = self.data.split_last() else {
            return Err(FormatError::InvalidString {
                field: self.tag,
                reason: "missing NUL terminator".to_string(),
            });
        };
        if text.contains(&0) {
            return Err(FormatError::InvalidString {
                field: self.tag,
                reason: "embedded NUL before the terminator".to_string(),
            });
        }
        String::from_utf8(text.to_vec()).map_err(|e| FormatError::InvalidString {
            field: self.tag,
            reason: e.to_string(),
        })
    }

    /// Append the encoded field to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) -> FormatResult<()> {
        if self.needs_size_prefix() {
            let size = u32::try_from(self.data.len()).map_err(|_| FormatError::TooLarge {
                what: "field",
                size: self.data.len(),
            })?;
            out.extend_from_slice(Tag::XXXX.as_bytes());
            out.extend_from_slice(&4u16.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(self.tag.as_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
        } else {
            out.extend_from_slice(self.tag.as_bytes());
            out.extend_from_slice(&(self.data.len() as u16).to_le_bytes());
        }
        out.extend_from_slice(&self.data);
        Ok(())
    }
}

/// Split an uncompressed record payload into its fields
///
/// `record` only labels errors.
pub fn parse_fields(record: Tag, payload: &[u8]) -> FormatResult<Vec<Field>> {
    let mut fields = Vec::new();
    let mut rest = payload;
    let mut announced: Option<usize> = None;

    while !rest.is_empty() {
        let Some((head, body)) = rest.split_first_chunk::<FIELD_HEADER_SIZE>() else {
            return Err(FormatError::InvalidField {
                record,
                field: Tag::new([0; 4]),
                reason: format!("{} trailing bytes cannot hold a field header", rest.len()),
            });
        };
        let tag = Tag::new([head[0], head[1], head[2], head[3]]);
        let short_len = usize::from(u16::from_le_bytes([head[4], head[5]]));
        let len = announced.take().unwrap_or(short_len);

        if body.len() < len {
            return Err(FormatError::InvalidField {
                record,
                field: tag,
                reason: format!("length {len} runs past the end of the record"),
            });
        }
        let (data, tail) = body.split_at(len);
        rest = tail;

        if tag == Tag::XXXX {
            let bytes: [u8; 4] = data.try_into().map_err(|_| FormatError::InvalidField {
                record,
                field: tag,
                reason: format!("size prefix must be 4 bytes, found {len}"),
            })?;
            announced = Some(u32::from_le_bytes(bytes) as usize);
            continue;
        }
        fields.push(Field::new(tag, data));
    }

    if announced.is_some() {
        return Err(FormatError::InvalidField {
            record,
            field: Tag::XXXX,
            reason: "size prefix is not followed by a field".to_string(),
        });
    }
    Ok(fields)
}

/// Encode fields back-to-back into a payload
pub fn write_fields(fields: &[Field]) -> FormatResult<Vec<u8>> {
    let mut out = Vec::with_capacity(fields_size(fields));
    for field in fields {
        field.write_to(&mut out)?;
    }
    Ok(out)
}

/// Payload length occupied by `fields`
pub fn fields_size(fields: &[Field]) -> usize {
    fields.iter().map(Field::written_size).sum()
}
