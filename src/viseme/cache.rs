//! Viseme name → morph-target slot cache.
//!
//! Derived from a [`MappingTable`] and the loaded mesh's shape dictionary.
//! The cache is always rebuilt from scratch so that nothing from a previous
//! mesh or mapping survives a swap.

use crate::influence::ShapeDictionary;
use crate::viseme::VisemeName;
use crate::viseme::mapping::MappingTable;
use std::collections::BTreeMap;
use tracing::debug;

/// Prefix some rigs put in front of viseme-named shapes (`viseme_aa`).
pub const DEFAULT_SHAPE_NAMESPACE: &str = "viseme_";

/// Resolved morph-target slots keyed by viseme name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeIndexCache {
    slots: BTreeMap<String, usize>,
    /// Namespaced slots keyed with the namespace stripped (`viseme_aa` as `aa`).
    namespaced: BTreeMap<String, usize>,
    namespace: String,
    built_from: Option<u64>,
}

impl Default for ShapeIndexCache {
    fn default() -> Self {
        Self::new(DEFAULT_SHAPE_NAMESPACE)
    }
}

impl ShapeIndexCache {
    /// Empty cache using `namespace` for the prefixed lookup step.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            slots: BTreeMap::new(),
            namespaced: BTreeMap::new(),
            namespace: namespace.into(),
            built_from: None,
        }
    }

    /// Build a fresh cache.
    pub fn build(
        namespace: impl Into<String>,
        mapping: &MappingTable,
        dictionary: &ShapeDictionary,
    ) -> Self {
        let mut cache = Self::new(namespace);
        cache.rebuild(mapping, dictionary);
        cache
    }

    /// Replace the whole cache from `mapping` and `dictionary`.
    ///
    /// Entries mapped to `None` or to a shape missing from `dictionary` are
    /// left out entirely.
    pub fn rebuild(&mut self, mapping: &MappingTable, dictionary: &ShapeDictionary) {
        self.slots = mapping
            .iter()
            .filter_map(|(name, shape)| {
                let slot = dictionary.get(shape?)?;
                Some((name.to_owned(), *slot))
            })
            .collect();
        let namespace = self.namespace.as_str();
        self.namespaced = self
            .slots
            .iter()
            .filter_map(|(name, slot)| {
                let bare = name.strip_prefix(namespace).filter(|_| !namespace.is_empty())?;
                Some((bare.to_owned(), *slot))
            })
            .collect();
        self.built_from = Some(mapping.revision());
        debug!(
            resolved = self.slots.len(),
            mapped = mapping.len(),
            shapes = dictionary.len(),
            "rebuilt shape index cache"
        );
    }

    /// Drop every entry (no mesh loaded).
    pub fn clear(&mut self) {
        self.slots.clear();
        self.namespaced.clear();
        self.built_from = None;
    }

    /// Whether this cache was built from the current state of `mapping`.
    pub fn is_current(&self, mapping: &MappingTable) -> bool {
        self.built_from == Some(mapping.revision())
    }

    /// Exact slot for `name`, without fallbacks.
    pub fn get(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }

    /// Resolve a slot for `key`: exact key, then the namespaced key, then the
    /// silence entry. `None` means nothing should be applied.
    ///
    /// The unknown viseme goes straight to silence.
    pub fn resolve(&self, key: &str) -> Option<usize> {
        let silence = || self.get(VisemeName::Sil.as_str());
        if key == VisemeName::Unknown.as_str() {
            return silence();
        }
        self.get(key)
            .or_else(|| self.namespaced.get(key).copied())
            .or_else(silence)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
