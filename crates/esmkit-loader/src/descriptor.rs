//! File descriptors: a file's name and its declared masters

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use esmkit_formats::{FileHeader, MasterFile, peek_file_header};
use tracing::debug;

use crate::{LoaderError, Result};

/// File extensions accepted as masters or plugins
pub const PLUGIN_EXTENSIONS: &[&str] = &["esm", "esp", "esl"];

/// Name and masters of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// File name without directories
    pub name: String,
    /// Path the descriptor was read from, if any
    pub path: Option<PathBuf>,
    /// Declared masters in declaration order
    pub masters: Vec<MasterFile>,
    /// Whether the header carries the master flag
    pub is_master: bool,
}

impl FileDescriptor {
    /// Descriptor built in memory, for files that are about to be written
    pub fn new<I, S>(name: impl Into<String>, masters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            path: None,
            masters: masters.into_iter().map(MasterFile::new).collect(),
            is_master: false,
        }
    }

    /// Descriptor taken from an already decoded header
    pub fn from_header(name: impl Into<String>, header: &FileHeader) -> Self {
        Self {
            name: name.into(),
            path: None,
            masters: header.masters.clone(),
            is_master: header.is_master(),
        }
    }

    /// Read only the header record of the file at `path`
    pub fn peek<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = plugin_name(path)?;
        let file = File::open(path).map_err(|e| LoaderError::from(e).in_file(path, 0))?;
        let mut reader = BufReader::new(file);
        let header = peek_file_header(&mut reader)
            .map_err(|e| LoaderError::from(e).in_file(path, 0))?;
        debug!(
            "Peeked {}: {} masters{}",
            name,
            header.masters.len(),
            if header.is_master() { ", master flag" } else { "" }
        );
        Ok(Self {
            path: Some(path.to_path_buf()),
            ..Self::from_header(name, &header)
        })
    }

    /// Master names in declaration order
    pub fn master_names(&self) -> impl Iterator<Item = &str> {
        self.masters.iter().map(|m| m.name.as_str())
    }
}

/// File name of a path with a master or plugin extension
pub fn plugin_name(path: &Path) -> Result<String> {
    let not_plugin = || LoaderError::NotAPluginFile {
        path: path.to_path_buf(),
    };
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(not_plugin)?;
    if !PLUGIN_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(extension))
    {
        return Err(not_plugin());
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(not_plugin)
}
