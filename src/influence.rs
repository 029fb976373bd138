//! Morph-target influence vector and the mesh boundary.
//!
//! The renderer owns the mesh; the engine only ever zeroes the influence
//! vector and sets single slots. The vector is never resized.

use crate::viseme::cache::ShapeIndexCache;
use std::collections::HashMap;
use tracing::warn;

/// Shape (morph target) name → slot in the influence vector.
pub type ShapeDictionary = HashMap<String, usize>;

/// A mesh exposing morph targets.
pub trait MorphTargets {
    /// Read-only name → slot dictionary.
    fn shape_dictionary(&self) -> &ShapeDictionary;

    /// Current per-slot weights.
    fn influences(&self) -> &[f32];

    /// Mutable per-slot weights. Implementations must keep the length fixed.
    fn influences_mut(&mut self) -> &mut [f32];
}

/// Plain in-memory mesh: a shape dictionary plus its influence vector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceMesh {
    dictionary: ShapeDictionary,
    influences: Vec<f32>,
}

impl FaceMesh {
    /// Mesh whose morph targets occupy slots in iteration order.
    pub fn from_shape_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dictionary: ShapeDictionary = names
            .into_iter()
            .enumerate()
            .map(|(slot, name)| (name.into(), slot))
            .collect();
        let len = dictionary.values().max().map_or(0, |max| max + 1);
        Self {
            dictionary,
            influences: vec![0.0; len],
        }
    }

    /// Weight of the named shape, if the mesh has it.
    pub fn weight(&self, shape: &str) -> Option<f32> {
        let slot = *self.dictionary.get(shape)?;
        self.influences.get(slot).copied()
    }

    /// Names of all morph targets, sorted by slot.
    pub fn shape_names(&self) -> Vec<&str> {
        let mut names: Vec<(&str, usize)> = self
            .dictionary
            .iter()
            .map(|(name, slot)| (name.as_str(), *slot))
            .collect();
        names.sort_by_key(|(_, slot)| *slot);
        names.into_iter().map(|(name, _)| name).collect()
    }
}

impl MorphTargets for FaceMesh {
    fn shape_dictionary(&self) -> &ShapeDictionary {
        &self.dictionary
    }

    fn influences(&self) -> &[f32] {
        &self.influences
    }

    fn influences_mut(&mut self) -> &mut [f32] {
        &mut self.influences
    }
}

/// Zero every influence.
pub fn reset(influences: &mut [f32]) {
    influences.fill(0.0);
}

/// Show exactly one shape: zero the vector, then set the slot resolved for
/// `key` to full weight. No blending with the previous shape.
///
/// Returns the slot that was set. When nothing resolves, or the resolved slot
/// lies outside the vector, the vector stays all-zero (closed mouth).
pub fn apply(cache: &ShapeIndexCache, influences: &mut [f32], key: &str) -> Option<usize> {
    reset(influences);
    let slot = cache.resolve(key)?;
    match influences.get_mut(slot) {
        Some(weight) => {
            *weight = 1.0;
            Some(slot)
        }
        None => {
            warn!(
                key,
                slot,
                len = influences.len(),
                "resolved morph target slot is outside the influence vector"
            );
            None
        }
    }
}

/// Whether every influence is zero.
pub fn is_neutral(influences: &[f32]) -> bool {
    influences.iter().all(|w| *w == 0.0)
}
