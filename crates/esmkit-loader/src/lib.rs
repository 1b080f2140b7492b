//! Multi-file loading for master and plugin container files.
//!
//! This crate sits on top of `esmkit-formats` and handles everything that
//! involves more than one file at a time:
//!
//! - **Descriptors**: each file's name and declared masters, harvested by
//!   peeking at the header record only
//! - **Load order**: a deterministic post-order over the master graph,
//!   capped at 255 files
//! - **Relocation**: rewriting the mod index of identifiers from a file's
//!   own master list to the global load order
//! - **Record stores**: one identifier-keyed store per record tag, kept in
//!   an explicit [`Registry`] owned by the caller
//! - **Reading and writing**: [`read_container`], [`write_container`] and
//!   [`write_registry`]
//! - **Sessions**: [`LoadSession`] runs the whole pipeline over a set of
//!   paths
//!
//! # Example
//!
//! ```rust,no_run
//! use esmkit_loader::{LoadConfig, LoadSession};
//!
//! # fn example() -> esmkit_loader::Result<()> {
//! let config = LoadConfig::new("/games/skyrim/Data").with_wanted_tags(["NPC_", "WEAP"]);
//! let mut session = LoadSession::new(config);
//! let report = session.load_all(&["Skyrim.esm", "Update.esm", "MyMod.esp"])?;
//!
//! println!("Load order: {:?}", report.load_order.names());
//! println!("Records: {}", session.registry().record_count());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use std::path::PathBuf;

use esmkit_formats::FormatError;
use thiserror::Error;

// Configuration
pub mod config;
// File descriptors and header peeking
pub mod descriptor;
// Dependency solver
pub mod load_order;
// Reading files into stores
pub mod reader;
// Per-tag record stores
pub mod registry;
// Identifier relocation
pub mod relocation;
// Multi-file pipeline
pub mod session;
// Single-tag store
pub mod store;
// Writing files
pub mod writer;

pub use config::LoadConfig;
pub use descriptor::FileDescriptor;
pub use load_order::{LoadOrder, MAX_LOAD_ORDER, solve_load_order};
pub use reader::{ContainerRead, read_container};
pub use registry::Registry;
pub use relocation::Relocator;
pub use session::{FileFailure, FileReport, LoadReport, LoadSession};
pub use store::{InsertOutcome, RecordStore};
pub use writer::{write_container, write_registry};

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors raised while solving, relocating, reading or writing
#[derive(Debug, Error)]
pub enum LoaderError {
    /// A declared master is not among the files being loaded
    #[error("missing master file '{name}' required by '{required_by}'")]
    MissingPrerequisite {
        /// Name of the missing master
        name: String,
        /// File that declared it
        required_by: String,
    },

    /// Placing another file would exceed the mod index space
    #[error("load order cannot hold more than {limit} files")]
    TooManyFiles {
        /// Maximum number of files
        limit: usize,
    },

    /// Files declare each other as masters
    #[error("master dependency cycle: {}", chain.join(" -> "))]
    DependencyCycle {
        /// Files along the cycle, first and last being the same
        chain: Vec<String>,
    },

    /// Relocation was attempted with no load order
    #[error("load order is empty")]
    EmptyLoadOrder,

    /// The load order given to the relocator has too many entries
    #[error("load order has {len} entries, at most 255 are addressable")]
    LoadOrderTooLarge {
        /// Number of entries
        len: usize,
    },

    /// A file declares more masters than local mod indices exist
    #[error("'{file}' declares {count} masters, at most 255 are addressable")]
    TooManyMasters {
        /// File being relocated
        file: String,
        /// Number of masters it declares
        count: usize,
    },

    /// A master or the file itself is absent from the load order
    #[error("'{name}' is not in the load order")]
    NotInLoadOrder {
        /// Missing name
        name: String,
    },

    /// An identifier's mod index has no entry in the relocation map
    #[error("mod index {index:#04x} has no mapping for '{file}'")]
    UnmappedModIndex {
        /// Local mod index
        index: u8,
        /// File the map was built for
        file: String,
    },

    /// The relocation map has not been rebuilt since the file changed
    #[error("relocation map is stale; rebuild it for the current file first")]
    StaleRelocationMap,

    /// Path does not name a master or plugin file
    #[error("not a master or plugin file: {}", path.display())]
    NotAPluginFile {
        /// Offending path
        path: PathBuf,
    },

    /// A failure while processing one file
    #[error("{}: {source} (last position {offset})", path.display())]
    File {
        /// File being processed
        path: PathBuf,
        /// Stream position when the failure surfaced
        offset: u64,
        /// Underlying failure
        #[source]
        source: Box<LoaderError>,
    },

    /// Container format error
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoaderError {
    /// Attach the file path and stream position to an error
    pub fn in_file(self, path: impl Into<PathBuf>, offset: u64) -> Self {
        match self {
            already @ Self::File { .. } => already,
            other => Self::File {
                path: path.into(),
                offset,
                source: Box::new(other),
            },
        }
    }

    /// Innermost error, looking through [`LoaderError::File`]
    pub fn root(&self) -> &Self {
        match self {
            Self::File { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Version information for the loader
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
