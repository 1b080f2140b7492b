//! Configuration for loading sessions

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use esmkit_formats::Tag;
use serde::{Deserialize, Serialize};

use crate::{LoaderError, Result};

/// Configuration for a loading session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Directory that relative file paths are resolved against
    pub data_dir: PathBuf,

    /// Record tags to load; `None` loads every tag
    ///
    /// Top-level groups for other tags are skipped without being read.
    pub wanted_tags: Option<Vec<String>>,

    /// Rewrite identifiers to the global load order
    pub relocate: bool,

    /// Store compressed records in inflated form
    pub decompress_records: bool,

    /// Treat re-reading an identical record as a no-op
    pub dedupe_equal: bool,

    /// Abort the session on the first failing file
    pub stop_on_error: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            wanted_tags: None,
            relocate: true,
            decompress_records: true,
            dedupe_equal: false,
            stop_on_error: true,
        }
    }
}

impl LoadConfig {
    /// Create a new configuration with the specified data directory
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| LoaderError::Config(e.to_string()))?;
        config.wanted_tag_set()?;
        Ok(config)
    }

    /// Read a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Serialize as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| LoaderError::Config(e.to_string()))
    }

    /// Set the data directory
    #[must_use]
    pub fn with_data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = path.as_ref().to_path_buf();
        self
    }

    /// Restrict loading to the given record tags
    #[must_use]
    pub fn with_wanted_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wanted_tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Enable or disable identifier relocation
    #[must_use]
    pub const fn with_relocation(mut self, enable: bool) -> Self {
        self.relocate = enable;
        self
    }

    /// Enable or disable inflating compressed records on load
    #[must_use]
    pub const fn with_decompression(mut self, enable: bool) -> Self {
        self.decompress_records = enable;
        self
    }

    /// Enable or disable equality-before-replace in record stores
    #[must_use]
    pub const fn with_dedupe_equal(mut self, enable: bool) -> Self {
        self.dedupe_equal = enable;
        self
    }

    /// Abort on the first failing file, or continue with the rest
    #[must_use]
    pub const fn with_stop_on_error(mut self, enable: bool) -> Self {
        self.stop_on_error = enable;
        self
    }

    /// Resolve a file path against the data directory
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    /// Wanted tags as a set, validating each entry
    pub fn wanted_tag_set(&self) -> Result<Option<HashSet<Tag>>> {
        let Some(tags) = &self.wanted_tags else {
            return Ok(None);
        };
        tags.iter()
            .map(|t| Tag::try_from(t.as_str()).map_err(LoaderError::Config))
            .collect::<Result<HashSet<_>>>()
            .map(Some)
    }
}
