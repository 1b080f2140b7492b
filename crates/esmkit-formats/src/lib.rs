//! Binary container format for game master and plugin files
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Record tags don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::float_cmp)] // Binary format requirements
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
//! This crate reads and writes the tag-prefixed container format used by
//! `.esm`/`.esp` files: a leading `TES4` header record followed by a tree of
//! groups that hold records and further groups.
//!
//! # Layers
//!
//! - **Tags and identifiers**: [`Tag`] and [`FormId`]
//! - **Records**: [`RecordHeader`], [`Record`] and its [`Field`]s, with
//!   transparent zlib compression through [`compression`]
//! - **Groups**: [`Group`], an owned tree indexed by identifier
//! - **Walking**: [`ContainerWalker`] drives a [`ContainerVisitor`] and a
//!   [`DispatchTable`], skipping unwanted groups without reading them
//! - **Writing**: [`writer`] sizes a tree bottom-up and serializes it
//! - **Whole files**: [`ContainerFile`] and [`peek_file_header`]
//!
//! # Design Principles
//!
//! - **Symmetric Operations**: Both parsing and building supported
//! - **Exact Byte Accounting**: Skipped groups advance by their declared size
//! - **Round-Trip Guarantee**: build(parse(data)) == data

#![warn(missing_docs)]

/// Compression adapter for record payloads (zlib and LZ4 frame)
pub mod compression;
pub mod container;
/// Tag to handler dispatch for the walker
pub mod dispatch;
pub mod error;
pub mod file_header;
pub mod form_id;
pub mod group;
/// Records, record headers and fields
pub mod record;
pub mod tag;
pub mod walker;
pub mod writer;

// Test utilities module
#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_utils;

pub use container::{ContainerFile, peek_file_header};
pub use dispatch::{DispatchTable, RecordHandler, RecordOutcome};
pub use error::{FormatError, FormatResult};
pub use file_header::{FileHeader, MasterFile};
pub use form_id::FormId;
pub use group::{Group, GroupHeader, GroupType, Member};
pub use record::{Field, Record, RecordHeader};
pub use tag::Tag;
pub use walker::{ContainerVisitor, ContainerWalker};

/// Common format trait for types with a byte-level encoding
pub trait EsmFormat: Sized {
    /// Parse from bytes
    fn parse(data: &[u8]) -> FormatResult<Self>;

    /// Build to bytes
    fn build(&self) -> FormatResult<Vec<u8>>;

    /// Verify round-trip correctness
    fn verify_round_trip(data: &[u8]) -> FormatResult<()> {
        let parsed = Self::parse(data)?;
        let rebuilt = parsed.build()?;
        if data != rebuilt.as_slice() {
            let offset = data
                .iter()
                .zip(&rebuilt)
                .position(|(a, b)| a != b)
                .unwrap_or_else(|| data.len().min(rebuilt.len()));
            return Err(FormatError::RoundTripMismatch { offset });
        }
        Ok(())
    }
}
