//! Identifier relocation from a file's own frame to the global load order
//!
//! While a file is parsed, the mod index of each identifier is a position
//! in that file's master list, with the file itself one past the last
//! master. The relocator maps those local positions to positions in the
//! global [`LoadOrder`] and rewrites the high byte accordingly.
//!
//! The map belongs to one file at a time. [`Relocator::request_update`]
//! marks it stale when a new file is about to be parsed, and relocating
//! with a stale map is an error until [`Relocator::rebuild`] runs.

use esmkit_formats::FormId;
use tracing::{debug, trace};

use crate::load_order::{LoadOrder, MAX_LOAD_ORDER};
use crate::{LoaderError, Result};

/// Most masters a file may declare; local index 255 is the file itself
pub const MAX_MASTERS: usize = 255;

/// Local-to-global mod index translation for one file at a time
#[derive(Debug, Clone)]
pub struct Relocator {
    load_order: LoadOrder,
    masters: Vec<String>,
    current_file: String,
    /// `map[local]` is the global index for local mod index `local`
    map: Vec<u8>,
    stale: bool,
}

impl Relocator {
    /// Relocator for `load_order`, with no file selected yet
    pub fn new(load_order: LoadOrder) -> Self {
        Self {
            load_order,
            masters: Vec::new(),
            current_file: String::new(),
            map: Vec::new(),
            stale: true,
        }
    }

    /// Global load order
    pub fn load_order(&self) -> &LoadOrder {
        &self.load_order
    }

    /// Replace the global load order, invalidating the map
    pub fn set_load_order(&mut self, load_order: LoadOrder) {
        self.load_order = load_order;
        self.invalidate();
    }

    /// Announce that `file` is about to be parsed
    ///
    /// Clears the map and the master list; supply masters with
    /// [`Relocator::set_masters`] and then call [`Relocator::rebuild`].
    pub fn request_update(&mut self, file: &str) {
        file.clone_into(&mut self.current_file);
        self.masters.clear();
        self.invalidate();
    }

    /// Set the current file's masters in declaration order
    pub fn set_masters<I, S>(&mut self, masters: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.masters = masters.into_iter().map(Into::into).collect();
        self.invalidate();
    }

    /// Whether the map must be rebuilt before relocating
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// File the map is built, or being prepared, for
    pub fn current_file(&self) -> &str {
        &self.current_file
    }

    /// Number of entries in the map: masters plus one when built
    pub fn map_len(&self) -> usize {
        self.map.len()
    }

    /// Global index for local mod index `local`
    pub fn mapping(&self, local: u8) -> Option<u8> {
        self.map.get(usize::from(local)).copied()
    }

    /// Build the map for `file` from the stored masters
    ///
    /// Names are matched against the load order case-insensitively.
    ///
    /// # Errors
    ///
    /// - [`LoaderError::EmptyLoadOrder`] or [`LoaderError::LoadOrderTooLarge`]
    ///   for an unusable load order
    /// - [`LoaderError::TooManyMasters`] if more than 255 masters are set
    /// - [`LoaderError::NotInLoadOrder`] if a master or `file` is missing
    pub fn rebuild(&mut self, file: &str) -> Result<()> {
        if file != self.current_file {
            file.clone_into(&mut self.current_file);
        }
        self.invalidate();

        if self.load_order.is_empty() {
            return Err(LoaderError::EmptyLoadOrder);
        }
        if self.load_order.len() > MAX_LOAD_ORDER {
            return Err(LoaderError::LoadOrderTooLarge {
                len: self.load_order.len(),
            });
        }
        if self.masters.len() > MAX_MASTERS {
            return Err(LoaderError::TooManyMasters {
                file: file.to_string(),
                count: self.masters.len(),
            });
        }

        let mut map = Vec::with_capacity(self.masters.len() + 1);
        for name in self.masters.iter().map(String::as_str).chain([file]) {
            let global = self
                .load_order
                .position(name)
                .ok_or_else(|| LoaderError::NotInLoadOrder {
                    name: name.to_string(),
                })?;
            // position < 255 after the size check above
            map.push(global as u8);
        }

        debug!(
            "Relocation map for {}: {}",
            file,
            map.iter()
                .enumerate()
                .map(|(local, global)| format!("{local:02X}->{global:02X}"))
                .collect::<Vec<_>>()
                .join(" ")
        );
        self.map = map;
        self.stale = false;
        Ok(())
    }

    /// Announce `file`, set its masters and rebuild in one step
    pub fn prepare<I, S>(&mut self, file: &str, masters: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request_update(file);
        self.set_masters(masters);
        self.rebuild(file)
    }

    /// Rewrite the mod index of `form_id` to the global frame
    ///
    /// The object index is never touched. On error the caller keeps the
    /// original identifier.
    pub fn relocate(&self, form_id: FormId) -> Result<FormId> {
        if self.stale {
            return Err(LoaderError::StaleRelocationMap);
        }
        let local = form_id.mod_index();
        let global = self
            .mapping(local)
            .ok_or_else(|| LoaderError::UnmappedModIndex {
                index: local,
                file: self.current_file.clone(),
            })?;
        let relocated = form_id.with_mod_index(global);
        if relocated != form_id {
            trace!("Relocated {} -> {}", form_id, relocated);
        }
        Ok(relocated)
    }

    fn invalidate(&mut self) {
        self.map.clear();
        self.stale = true;
    }
}
