//! Per-utterance viseme timeline.
//!
//! The timeline is a step function: each entry holds from its offset until
//! the next entry's offset. Events are never resampled or interpolated.

use crate::viseme::mapping::MappingTable;
use crate::viseme::{VisemeEvent, VisemeName};
use serde::Serialize;
use tracing::{debug, warn};

/// Shape used when neither the viseme nor silence has a mapping.
pub const DEFAULT_CLOSED_MOUTH_SHAPE: &str = "mouthClose";

/// One step of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    /// Offset from utterance start, in seconds.
    pub time_offset_secs: f64,
    /// Viseme shown from this offset on.
    pub viseme: VisemeName,
    /// Shape key the viseme resolved to when the timeline was built.
    pub shape: String,
}

impl TimelineEntry {
    pub fn new(time_offset_secs: f64, viseme: VisemeName, shape: impl Into<String>) -> Self {
        Self {
            time_offset_secs,
            viseme,
            shape: shape.into(),
        }
    }

    /// Key handed to the influence applicator.
    ///
    /// The viseme name, so mapping edits made during playback take effect on
    /// the next frame through the rebuilt shape index cache. Unknown visemes
    /// apply as silence.
    pub fn apply_key(&self) -> &'static str {
        self.viseme.lookup_key()
    }
}

/// Ordered entries for one utterance plus its audio duration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    audio_duration_secs: f64,
}

impl Timeline {
    /// Map each event through the viseme vocabulary and `mapping`.
    ///
    /// Unknown ids are logged and become [`VisemeName::Unknown`]. A viseme
    /// with no mapping takes the silence shape, and `closed_mouth_shape` when
    /// silence is unmapped too, so every entry carries a shape.
    pub fn build(
        events: &[VisemeEvent],
        mapping: &MappingTable,
        audio_duration_secs: f64,
        closed_mouth_shape: &str,
    ) -> Self {
        let entries: Vec<TimelineEntry> = events
            .iter()
            .map(|event| {
                let viseme = event.viseme();
                let shape = mapping.shape_for(viseme).unwrap_or(closed_mouth_shape);
                TimelineEntry::new(event.time_offset_secs, viseme, shape)
            })
            .collect();

        if entries
            .windows(2)
            .any(|w| w[1].time_offset_secs < w[0].time_offset_secs)
        {
            warn!("viseme events are not in time order; playback will hold earlier entries");
        }
        debug!(
            entries = entries.len(),
            audio_duration_secs, "built viseme timeline"
        );

        Self::from_entries(entries, audio_duration_secs)
    }

    /// Wrap pre-resolved entries.
    pub fn from_entries(entries: Vec<TimelineEntry>, audio_duration_secs: f64) -> Self {
        Self {
            entries,
            audio_duration_secs: sanitize_duration(audio_duration_secs),
        }
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&TimelineEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Audio duration in seconds; 0 when unknown.
    pub fn audio_duration_secs(&self) -> f64 {
        self.audio_duration_secs
    }

    /// Replace the duration once the real audio length is known.
    ///
    /// Only possible while the caller still owns the timeline, i.e. before it
    /// is handed to the synchronizer.
    pub fn refine_duration(&mut self, audio_duration_secs: f64) {
        self.audio_duration_secs = sanitize_duration(audio_duration_secs);
    }

    /// Offset of the last entry, 0 for an empty timeline.
    pub fn last_offset_secs(&self) -> f64 {
        self.entries.last().map_or(0.0, |e| e.time_offset_secs)
    }

    /// Later of the last entry and the audio duration.
    pub fn end_time_secs(&self) -> f64 {
        self.last_offset_secs().max(self.audio_duration_secs)
    }
}

fn sanitize_duration(secs: f64) -> f64 {
    if secs.is_finite() && secs > 0.0 {
        secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::viseme::mapping::DEFAULT_OPEN_SHAPE;

    fn events(pairs: &[(f64, u32)]) -> Vec<VisemeEvent> {
        pairs.iter().map(|(t, id)| VisemeEvent::new(*t, *id)).collect()
    }

    #[test]
    fn build_preserves_order_and_offsets() {
        let mapping = MappingTable::defaults();
        let timeline = Timeline::build(
            &events(&[(0.0, 0), (0.12, 1), (0.12, 19), (0.4, 0)]),
            &mapping,
            0.5,
            DEFAULT_CLOSED_MOUTH_SHAPE,
        );

        let offsets: Vec<f64> = timeline.entries().iter().map(|e| e.time_offset_secs).collect();
        assert_eq!(offsets, vec![0.0, 0.12, 0.12, 0.4]);
        let visemes: Vec<VisemeName> = timeline.entries().iter().map(|e| e.viseme).collect();
        assert_eq!(
            visemes,
            vec![VisemeName::Sil, VisemeName::Aa, VisemeName::K, VisemeName::Sil]
        );
        assert_eq!(timeline.entries()[1].shape, DEFAULT_OPEN_SHAPE);
    }

    #[test]
    fn unmapped_viseme_uses_silence_then_literal() {
        let mut mapping = MappingTable::defaults();
        let timeline = Timeline::build(&events(&[(0.0, 99)]), &mapping, 0.0, "mouthClose");
        assert_eq!(timeline.entries()[0].viseme, VisemeName::Unknown);
        assert_eq!(timeline.entries()[0].shape, "mouthClose");

        mapping.set_entry("sil", Some("MouthRest".into()));
        let timeline = Timeline::build(&events(&[(0.0, 99)]), &mapping, 0.0, "mouthClose");
        assert_eq!(timeline.entries()[0].shape, "MouthRest");
    }

    #[test]
    fn unknown_entry_in_mapping_does_not_reach_unknown_ids() {
        let mut mapping = MappingTable::defaults();
        mapping.set_entry("unknown", Some("Smile".into()));
        let timeline = Timeline::build(&events(&[(0.0, 99)]), &mapping, 0.0, "mouthClose");

        let entry = &timeline.entries()[0];
        assert_eq!(entry.shape, "mouthClose");
        assert_eq!(entry.apply_key(), "sil");
    }

    #[test]
    fn end_time_uses_later_of_last_entry_and_duration() {
        let mapping = MappingTable::defaults();
        let mut timeline =
            Timeline::build(&events(&[(0.0, 0), (0.8, 1)]), &mapping, 0.5, "mouthClose");
        assert!((timeline.end_time_secs() - 0.8).abs() < f64::EPSILON);

        timeline.refine_duration(1.25);
        assert!((timeline.end_time_secs() - 1.25).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_durations_become_zero() {
        let mut timeline = Timeline::from_entries(Vec::new(), f64::NAN);
        assert_eq!(timeline.audio_duration_secs(), 0.0);
        timeline.refine_duration(-1.0);
        assert_eq!(timeline.audio_duration_secs(), 0.0);
        assert_eq!(timeline.end_time_secs(), 0.0);
    }
}
