//! Viseme name → mesh shape key mapping.
//!
//! The table starts from hard-coded defaults and can be overridden per key by
//! a persisted flat JSON document (`{"aa": "MouthOpen", "sil": null}`).
//! Overrides replace whole entries; there is no deeper merge.

use crate::error::{LipSyncError, Result};
use crate::viseme::VisemeName;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Shape key used by the default table for every open-mouth viseme.
pub const DEFAULT_OPEN_SHAPE: &str = "MouthOpen";

/// Flat persisted form of the mapping: viseme name → shape key or `null`.
pub type MappingDocument = BTreeMap<String, Option<String>>;

/// Mutable viseme name → shape key table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingTable {
    entries: MappingDocument,
    revision: u64,
}

impl Default for MappingTable {
    fn default() -> Self {
        Self::defaults()
    }
}

impl MappingTable {
    /// The built-in table for a single-shape face: every viseme opens the
    /// mouth except the closed-lip classes (`sil`, `m`, `mbp`).
    pub fn defaults() -> Self {
        let entries = VisemeName::KNOWN
            .into_iter()
            .map(|name| {
                let shape = match name {
                    VisemeName::Sil | VisemeName::M | VisemeName::Mbp => None,
                    _ => Some(DEFAULT_OPEN_SHAPE.to_owned()),
                };
                (name.as_str().to_owned(), shape)
            })
            .collect();
        Self {
            entries,
            revision: 0,
        }
    }

    /// Shape key mapped to `name`, or `None` when unmapped or absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).and_then(|shape| shape.as_deref())
    }

    /// Shape key for a viseme, falling back to the silence entry.
    pub fn shape_for(&self, viseme: VisemeName) -> Option<&str> {
        self.get(viseme.lookup_key())
            .or_else(|| self.get(VisemeName::Sil.as_str()))
    }

    /// Iterate all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(name, shape)| (name.as_str(), shape.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Monotonic counter bumped on every mutation.
    ///
    /// Derived state (the shape index cache) records the revision it was built
    /// from and is rebuilt when the two differ.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace a single entry. Empty shape keys are stored as `None`.
    ///
    /// Returns the previous mapping for `name`.
    pub fn set_entry(&mut self, name: &str, shape: Option<String>) -> Option<String> {
        let shape = normalize(shape);
        debug!(viseme = name, shape = ?shape, "mapping entry updated");
        self.revision += 1;
        self.entries.insert(name.to_owned(), shape).flatten()
    }

    /// Overwrite matching keys with `partial`. Unknown keys are kept verbatim.
    pub fn merge(&mut self, partial: MappingDocument) {
        if partial.is_empty() {
            return;
        }
        for (name, shape) in partial {
            self.entries.insert(name, normalize(shape));
        }
        self.revision += 1;
    }

    /// Merge a JSON override document.
    ///
    /// A malformed document is logged and discarded; the table is left as is.
    /// Returns whether the override was applied.
    pub fn merge_override(&mut self, json: &str) -> bool {
        match serde_json::from_str::<MappingDocument>(json) {
            Ok(partial) => {
                debug!(entries = partial.len(), "merging mapping override");
                self.merge(partial);
                true
            }
            Err(e) => {
                warn!(error = %e, "ignoring malformed viseme mapping override");
                false
            }
        }
    }

    /// Merge the override stored at `path`, if any.
    ///
    /// A missing file is not an error. Unreadable or malformed files are
    /// logged and the current table is kept. Returns whether an override was
    /// applied.
    pub fn load_override(&mut self, path: &Path) -> bool {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no saved viseme mapping, using current table");
                return false;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read saved viseme mapping");
                return false;
            }
        };
        let applied = self.merge_override(&content);
        if applied {
            info!(path = %path.display(), "loaded saved viseme mapping");
        }
        applied
    }

    /// Flat key/value form, the inverse of [`MappingTable::merge`].
    pub fn serialize(&self) -> MappingDocument {
        self.entries.clone()
    }

    /// Pretty JSON form of [`MappingTable::serialize`].
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.entries)
            .map_err(|e| LipSyncError::Mapping(format!("failed to encode mapping: {e}")))
    }

    /// Write the table to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), entries = self.entries.len(), "saved viseme mapping");
        Ok(())
    }

    /// Sorted, de-duplicated viseme names a configuration surface should list.
    pub fn configurable_visemes() -> Vec<&'static str> {
        let names: BTreeSet<&'static str> =
            VisemeName::KNOWN.into_iter().map(VisemeName::as_str).collect();
        names.into_iter().collect()
    }

    /// Entries whose shape key does not exist in `shape_names`.
    pub fn unresolved_entries<'a, F>(&'a self, contains: F) -> Vec<(&'a str, &'a str)>
    where
        F: Fn(&str) -> bool,
    {
        self.iter()
            .filter_map(|(name, shape)| shape.map(|shape| (name, shape)))
            .filter(|(_, shape)| !contains(shape))
            .collect()
    }
}

fn normalize(shape: Option<String>) -> Option<String> {
    shape.filter(|s| !s.is_empty())
}
