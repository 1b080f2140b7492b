//! Multi-file loading pipeline
//!
//! A [`LoadSession`] peeks at every file's header, solves the load order
//! from the declared masters, then reads each file in that order into its
//! [`Registry`] with the relocator re-seeded per file.

use std::path::Path;

use tracing::{info, warn};

use crate::config::LoadConfig;
use crate::descriptor::FileDescriptor;
use crate::load_order::{LoadOrder, solve_load_order};
use crate::reader::read_container;
use crate::registry::Registry;
use crate::relocation::Relocator;
use crate::{LoaderError, Result};

/// Outcome of reading one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// File name
    pub name: String,
    /// Mod index the file received
    pub mod_index: u8,
    /// Records stored from this file
    pub relevant: u64,
}

/// A file that could not be peeked or read
#[derive(Debug)]
pub struct FileFailure {
    /// File name, or the path as given when no name could be derived
    pub name: String,
    /// What went wrong
    pub error: LoaderError,
}

/// Result of [`LoadSession::load_all`]
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Solved load order
    pub load_order: LoadOrder,
    /// Files read successfully, in load order
    pub files: Vec<FileReport>,
    /// Files abandoned along the way; only filled when the session
    /// continues past errors
    pub failures: Vec<FileFailure>,
}

impl LoadReport {
    /// Records stored across all files
    pub fn total_relevant(&self) -> u64 {
        self.files.iter().map(|f| f.relevant).sum()
    }

    /// Whether every file was read
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Loads a set of files into one registry
#[derive(Debug)]
pub struct LoadSession {
    config: LoadConfig,
    registry: Registry,
    load_order: LoadOrder,
}

impl LoadSession {
    /// Session with an empty registry
    pub fn new(config: LoadConfig) -> Self {
        let registry = Registry::new().with_dedupe_equal(config.dedupe_equal);
        Self {
            config,
            registry,
            load_order: LoadOrder::default(),
        }
    }

    /// Session configuration
    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Records loaded so far
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access to the loaded records
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Give up the session and keep its records
    pub fn into_registry(self) -> Registry {
        self.registry
    }

    /// Load order of the last [`LoadSession::load_all`]
    pub fn load_order(&self) -> &LoadOrder {
        &self.load_order
    }

    /// Peek, order and read every file in `paths`
    ///
    /// Relative paths are resolved against the configured data directory.
    /// Solver failures always abort. Peek and read failures abort when
    /// `stop_on_error` is set and are collected in the report otherwise;
    /// a file whose header could not be peeked takes no part in solving,
    /// so its dependents fail with a missing master.
    pub fn load_all<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        let mut descriptors = Vec::with_capacity(paths.len());
        for path in paths {
            let path = self.config.resolve(path);
            match FileDescriptor::peek(&path) {
                Ok(descriptor) => descriptors.push(descriptor),
                Err(error) => self.fail(&mut report, display_name(&path), error)?,
            }
        }

        let order = solve_load_order(&descriptors)?;
        info!("Loading {} files: {}", order.len(), order.names().join(", "));
        self.load_order = order.clone();

        let mut relocator = Relocator::new(order.clone());
        for (index, name) in order.names().iter().enumerate() {
            let Some(path) = descriptors
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case(name))
                .and_then(|d| d.path.clone())
            else {
                continue;
            };
            match read_container(&path, &mut self.registry, Some(&mut relocator), &self.config) {
                Ok(read) => report.files.push(FileReport {
                    name: read.name,
                    // order length is capped at 255
                    mod_index: index as u8,
                    relevant: read.relevant,
                }),
                Err(error) => self.fail(&mut report, name.clone(), error)?,
            }
        }

        info!(
            "Loaded {} records from {} files ({} failed)",
            self.registry.record_count(),
            report.files.len(),
            report.failures.len()
        );
        report.load_order = order;
        Ok(report)
    }

    /// Abort with `error`, or log it and keep going
    fn fail(&self, report: &mut LoadReport, name: String, error: LoaderError) -> Result<()> {
        if self.config.stop_on_error {
            return Err(error);
        }
        match &error {
            LoaderError::File { offset, .. } => {
                warn!("Skipping {} (last position {}): {}", name, offset, error.root());
            }
            _ => warn!("Skipping {}: {}", name, error),
        }
        report.failures.push(FileFailure { name, error });
        Ok(())
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
