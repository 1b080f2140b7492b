//! Error types for container parsing and building

use crate::tag::Tag;
use thiserror::Error;

/// Errors that can occur while reading or writing container data
#[derive(Debug, Error)]
pub enum FormatError {
    /// Fewer bytes remain in the stream than a declared length requires
    #[error("truncated stream at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        /// Stream offset where the read started
        offset: u64,
        /// Bytes required by the declared length
        needed: u64,
        /// Bytes actually left in the stream
        available: u64,
    },

    /// A tag did not match what the current state expects
    #[error("unexpected tag at offset {offset}: expected {expected}, found {found}")]
    UnexpectedTag {
        /// Stream offset of the tag
        offset: u64,
        /// Tag the reader expected
        expected: Tag,
        /// Tag actually found
        found: Tag,
    },

    /// Group declares a size smaller than its own header
    #[error("invalid group size {size} at offset {offset} (minimum is 24)")]
    InvalidGroupSize {
        /// Stream offset of the group header
        offset: u64,
        /// Declared size
        size: u32,
    },

    /// Group members consumed more bytes than the group declared
    #[error("group body overran its declared end: position {offset}, end {end}")]
    GroupOverrun {
        /// Position after the last member
        offset: u64,
        /// Declared end of the group body
        end: u64,
    },

    /// A record or group arrived while no group was open to hold it
    #[error("{found} has no enclosing group")]
    NoEnclosingGroup {
        /// Tag of the orphaned member
        found: Tag,
    },

    /// A field has an invalid length or content
    #[error("invalid {field} field in {record}: {reason}")]
    InvalidField {
        /// Record tag
        record: Tag,
        /// Field tag
        field: Tag,
        /// What was wrong
        reason: String,
    },

    /// A mandatory field is absent
    #[error("{record} record is missing its {field} field")]
    MissingField {
        /// Record tag
        record: Tag,
        /// Field tag
        field: Tag,
    },

    /// A field that may occur only once occurred again
    #[error("{record} record has more than one {field} field")]
    DuplicateField {
        /// Record tag
        record: Tag,
        /// Field tag
        field: Tag,
    },

    /// A string field is not NUL-terminated or not valid UTF-8
    #[error("invalid string in {field} field: {reason}")]
    InvalidString {
        /// Field tag
        field: Tag,
        /// What was wrong
        reason: String,
    },

    /// Decompressing a payload failed
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// Decompressed output length differs from the declared length
    #[error("decompressed size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Declared uncompressed length
        expected: usize,
        /// Produced length
        actual: usize,
    },

    /// Compressing a payload failed
    #[error("compression failed: {0}")]
    Compression(String),

    /// A length does not fit the on-disk field width
    #[error("{what} of {size} bytes exceeds the format limit")]
    TooLarge {
        /// What was being sized
        what: &'static str,
        /// Offending size
        size: usize,
    },

    /// Rebuilt bytes differ from the parsed input
    #[error("round-trip mismatch at byte {offset}")]
    RoundTripMismatch {
        /// First differing offset
        offset: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for format operations
pub type FormatResult<T> = Result<T, FormatError>;
