//! Dependency solver producing the global load order
//!
//! Every file is placed after all of its masters, transitively. Files are
//! visited in case-insensitive name order and masters in declaration
//! order, each placed in depth-first post-order, which makes the result
//! independent of the order descriptors are supplied in.

use std::collections::{HashMap, HashSet};

use esmkit_formats::FormId;
use tracing::{debug, info};

use crate::descriptor::FileDescriptor;
use crate::{LoaderError, Result};

/// Most files a load order can hold; mod index 0xFF is never assigned
pub const MAX_LOAD_ORDER: usize = 255;

/// Ordered, duplicate-free list of file names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOrder {
    names: Vec<String>,
}

impl LoadOrder {
    /// Load order taken as given, without validation
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Names in order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no file is loaded
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of `name`, compared case-insensitively
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    /// Name at mod index `index`
    pub fn name_at(&self, index: u8) -> Option<&str> {
        self.names.get(usize::from(index)).map(String::as_str)
    }

    /// Human-readable identifier, optionally naming the defining file
    ///
    /// `01ABCDEF` renders as `xxABCDEF (file: Update.esm)`. Identifiers
    /// from the first file keep their digits.
    pub fn describe(&self, form_id: FormId, with_file: bool) -> String {
        let text = form_id.masked();
        if !with_file {
            return text;
        }
        match self.name_at(form_id.mod_index()) {
            Some(name) => format!("{text} (file: {name})"),
            None => format!("{text} (file: unknown)"),
        }
    }
}

/// Compute the load order for `descriptors`
///
/// Descriptors whose names differ only by case are treated as one file;
/// after sorting, the first one wins.
///
/// # Errors
///
/// - [`LoaderError::MissingPrerequisite`] if a master is not among the
///   descriptors
/// - [`LoaderError::DependencyCycle`] if masters form a cycle
/// - [`LoaderError::TooManyFiles`] if more than 255 files would be placed
pub fn solve_load_order(descriptors: &[FileDescriptor]) -> Result<LoadOrder> {
    let mut sorted: Vec<&FileDescriptor> = descriptors.iter().collect();
    sorted.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut by_name: HashMap<String, &FileDescriptor> = HashMap::with_capacity(sorted.len());
    for &descriptor in &sorted {
        by_name
            .entry(descriptor.name.to_lowercase())
            .or_insert(descriptor);
    }

    let mut order: Vec<String> = Vec::new();
    let mut placed: HashSet<String> = HashSet::new();

    for root in sorted {
        if placed.contains(&root.name.to_lowercase()) {
            continue;
        }
        place_with_masters(root, &by_name, &mut placed, &mut order)?;
    }

    info!("Solved load order of {} files", order.len());
    Ok(LoadOrder { names: order })
}

/// Iterative post-order placement of `root` and everything it depends on
fn place_with_masters(
    root: &FileDescriptor,
    by_name: &HashMap<String, &FileDescriptor>,
    placed: &mut HashSet<String>,
    order: &mut Vec<String>,
) -> Result<()> {
    // (descriptor, index of the next master to visit)
    let mut stack: Vec<(&FileDescriptor, usize)> = vec![(root, 0)];
    let mut visiting: HashSet<String> = HashSet::from([root.name.to_lowercase()]);

    while let Some((descriptor, next)) = stack.last().copied() {
        if let Some(master) = descriptor.masters.get(next) {
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            let key = master.name.to_lowercase();
            if placed.contains(&key) {
                continue;
            }
            if visiting.contains(&key) {
                let start = stack
                    .iter()
                    .position(|(d, _)| d.name.eq_ignore_ascii_case(&master.name))
                    .unwrap_or(0);
                let mut chain: Vec<String> =
                    stack[start..].iter().map(|(d, _)| d.name.clone()).collect();
                chain.push(master.name.clone());
                return Err(LoaderError::DependencyCycle { chain });
            }
            let Some(&dependency) = by_name.get(&key) else {
                return Err(LoaderError::MissingPrerequisite {
                    name: master.name.clone(),
                    required_by: descriptor.name.clone(),
                });
            };
            visiting.insert(key);
            stack.push((dependency, 0));
        } else {
            stack.pop();
            let key = descriptor.name.to_lowercase();
            visiting.remove(&key);
            if order.len() >= MAX_LOAD_ORDER {
                return Err(LoaderError::TooManyFiles {
                    limit: MAX_LOAD_ORDER,
                });
            }
            debug!("Load order {:02X}: {}", order.len(), descriptor.name);
            order.push(descriptor.name.clone());
            placed.insert(key);
        }
    }
    Ok(())
}
