//! Lip-sync context object.
//!
//! [`LipSyncEngine`] owns the mapping table, the shape index cache, the
//! playback synchronizer and the loaded mesh. The host calls [`LipSyncEngine::tick`]
//! once per rendered frame and routes configuration edits and playback
//! start/end notifications to the same instance, all from one thread.

use crate::config::LipSyncConfig;
use crate::error::Result;
use crate::influence::{self, MorphTargets, ShapeDictionary};
use crate::playback::{Clock, PlaybackSynchronizer, SyncStep, SystemClock};
use crate::timeline::Timeline;
use crate::utterance::Utterance;
use crate::viseme::cache::ShapeIndexCache;
use crate::viseme::mapping::MappingTable;
use crate::viseme::{VisemeEvent, VisemeName};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What a frame's [`LipSyncEngine::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing is playing.
    Idle,
    /// Timeline entry `index` is showing. `slot` is the morph target set to
    /// full weight, `None` when the viseme resolved to no shape.
    Active {
        index: usize,
        viseme: VisemeName,
        slot: Option<usize>,
    },
    /// Playback passed the end of the utterance this frame and was stopped.
    Finished,
}

/// Owns all mutable lip-sync state for one face.
pub struct LipSyncEngine<M, C = SystemClock> {
    config: LipSyncConfig,
    mapping: MappingTable,
    cache: ShapeIndexCache,
    sync: PlaybackSynchronizer,
    mesh: Option<M>,
    clock: C,
}

impl<M: MorphTargets> LipSyncEngine<M, SystemClock> {
    pub fn new(config: LipSyncConfig) -> Self {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<M: MorphTargets, C: Clock> LipSyncEngine<M, C> {
    /// Engine with the default mapping table and no mesh loaded.
    pub fn with_clock(config: LipSyncConfig, clock: C) -> Self {
        let cache = ShapeIndexCache::new(config.mapping.shape_namespace.clone());
        let sync = PlaybackSynchronizer::new(config.playback.grace_secs);
        Self {
            config,
            mapping: MappingTable::defaults(),
            cache,
            sync,
            mesh: None,
            clock,
        }
    }

    pub fn config(&self) -> &LipSyncConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // -----------------------------------------------------------------------
    // Mesh
    // -----------------------------------------------------------------------

    /// Install a new mesh, replacing any previous one.
    ///
    /// Playback is stopped, the saved mapping override is merged over the
    /// current table, the shape index cache is rebuilt against the new mesh
    /// and its influences are zeroed. Returns the previous mesh.
    pub fn load_mesh(&mut self, mesh: M) -> Option<M> {
        self.stop();
        let previous = self.mesh.replace(mesh);

        let path = self.config.mapping.resolved_path();
        self.mapping.load_override(&path);
        self.rebuild_cache();

        if let Some(mesh) = self.mesh.as_mut() {
            influence::reset(mesh.influences_mut());
            let unresolved = self
                .mapping
                .unresolved_entries(|shape| mesh.shape_dictionary().contains_key(shape));
            if !unresolved.is_empty() {
                debug!(?unresolved, "mapped shapes missing from mesh");
            }
            info!(
                shapes = mesh.shape_dictionary().len(),
                resolved = self.cache.len(),
                "face mesh loaded"
            );
        }
        previous
    }

    /// Remove the mesh. Playback is stopped and the cache cleared.
    pub fn unload_mesh(&mut self) -> Option<M> {
        self.stop();
        let previous = self.mesh.take();
        self.cache.clear();
        previous
    }

    pub fn mesh(&self) -> Option<&M> {
        self.mesh.as_ref()
    }

    pub fn mesh_mut(&mut self) -> Option<&mut M> {
        self.mesh.as_mut()
    }

    // -----------------------------------------------------------------------
    // Mapping
    // -----------------------------------------------------------------------

    pub fn mapping(&self) -> &MappingTable {
        &self.mapping
    }

    /// Direct access to the table. Edits made here are picked up by the next
    /// `tick`, `apply` or `start`, which rebuild the cache when it is stale.
    pub fn mapping_mut(&mut self) -> &mut MappingTable {
        &mut self.mapping
    }

    /// Remap one viseme and rebuild the shape index cache.
    pub fn set_mapping_entry(&mut self, viseme: &str, shape: Option<String>) -> Option<String> {
        let previous = self.mapping.set_entry(viseme, shape);
        self.rebuild_cache();
        previous
    }

    /// Merge a JSON override and rebuild the cache when it applied.
    pub fn merge_mapping_override(&mut self, json: &str) -> bool {
        let applied = self.mapping.merge_override(json);
        if applied {
            self.rebuild_cache();
        }
        applied
    }

    /// Persist the current table to the configured mapping path.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping document cannot be written.
    pub fn save_mapping(&self) -> Result<PathBuf> {
        let path = self.config.mapping.resolved_path();
        self.mapping.save(&path)?;
        Ok(path)
    }

    /// Shape index cache, rebuilt first if the mapping changed since.
    pub fn cache(&mut self) -> &ShapeIndexCache {
        self.refresh_cache();
        &self.cache
    }

    fn refresh_cache(&mut self) {
        if !self.cache.is_current(&self.mapping) {
            self.rebuild_cache();
        }
    }

    fn rebuild_cache(&mut self) {
        match self.mesh.as_ref() {
            Some(mesh) => self.cache.rebuild(&self.mapping, mesh.shape_dictionary()),
            None => self.cache.rebuild(&self.mapping, &ShapeDictionary::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Playback
    // -----------------------------------------------------------------------

    /// Resolve `events` into a timeline using the current mapping.
    pub fn build_timeline(&self, events: &[VisemeEvent], audio_duration_secs: f64) -> Timeline {
        Timeline::build(
            events,
            &self.mapping,
            audio_duration_secs,
            &self.config.mapping.closed_mouth_shape,
        )
    }

    /// Start playing `timeline`, anchoring the clock now.
    ///
    /// Whatever was playing is stopped and the influences are zeroed before
    /// the new timeline is installed. An empty timeline leaves the engine idle.
    pub fn start(&mut self, timeline: Timeline, audio_duration_secs: f64) -> bool {
        if self.mesh.is_none() {
            warn!("starting viseme playback with no face mesh loaded");
        }
        self.refresh_cache();
        self.reset_influences();
        let now = self.clock.now();
        self.sync.start(timeline, audio_duration_secs, now)
    }

    /// Build and start a timeline for a speech-service response.
    ///
    /// `measured_duration_secs` is the audio player's reported duration, if
    /// known by the time playback begins.
    pub fn start_utterance(
        &mut self,
        utterance: &Utterance,
        measured_duration_secs: Option<f64>,
    ) -> bool {
        let duration = utterance.playable_duration(measured_duration_secs);
        let timeline = self.build_timeline(&utterance.visemes, duration);
        self.start(timeline, duration)
    }

    /// Advance playback to the current clock time and apply the active shape.
    pub fn tick(&mut self) -> TickOutcome {
        self.refresh_cache();
        let now = self.clock.now();
        let Self {
            sync, cache, mesh, ..
        } = self;

        match sync.tick(now) {
            SyncStep::Idle => TickOutcome::Idle,
            SyncStep::Finished => {
                if let Some(mesh) = mesh.as_mut() {
                    influence::reset(mesh.influences_mut());
                }
                TickOutcome::Finished
            }
            SyncStep::Active { index, entry } => {
                let slot = mesh
                    .as_mut()
                    .and_then(|m| influence::apply(cache, m.influences_mut(), entry.apply_key()));
                TickOutcome::Active {
                    index,
                    viseme: entry.viseme,
                    slot,
                }
            }
        }
    }

    /// Stop playback and zero the influences. Safe to call when idle.
    pub fn stop(&mut self) {
        self.sync.stop();
        self.reset_influences();
    }

    /// Notification from the audio player that playback ended.
    pub fn playback_ended(&mut self) {
        debug!("audio playback ended");
        self.stop();
    }

    /// Show the shape for `key` right away, outside of timeline playback.
    pub fn apply(&mut self, key: &str) -> Option<usize> {
        self.refresh_cache();
        let mesh = self.mesh.as_mut()?;
        influence::apply(&self.cache, mesh.influences_mut(), key)
    }

    pub fn is_playing(&self) -> bool {
        self.sync.is_playing()
    }

    pub fn synchronizer(&self) -> &PlaybackSynchronizer {
        &self.sync
    }

    fn reset_influences(&mut self) {
        if let Some(mesh) = self.mesh.as_mut() {
            influence::reset(mesh.influences_mut());
        }
    }
}
