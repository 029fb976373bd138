//! Per-frame viseme playback scheduler.
//!
//! The synchronizer is anchored to a wall clock captured at `start` and is
//! advanced by `tick`, which the host calls once per rendered frame. The
//! cursor only ever moves forward within one utterance, so each tick costs
//! O(1) amortized regardless of timeline length.

use crate::timeline::{Timeline, TimelineEntry};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Tolerance past the end of the utterance before playback stops, absorbing
/// audio scheduling jitter.
pub const DEFAULT_GRACE_SECS: f64 = 0.05;

/// Monotonic time source in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// [`Clock`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Externally driven [`Clock`]. Clones share the same time.
///
/// Used by hosts that replay at a fixed frame rate and by tests.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_secs: f64) -> Self {
        let clock = Self::default();
        clock.set(start_secs);
        clock
    }

    pub fn set(&self, secs: f64) {
        self.bits.store(secs.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, secs: f64) {
        self.set(self.now() + secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Result of one [`PlaybackSynchronizer::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncStep<'a> {
    /// Nothing is playing.
    Idle,
    /// `entry` (at `index`) is the shape to show this frame.
    Active {
        index: usize,
        entry: &'a TimelineEntry,
    },
    /// The utterance ran past its end and playback has been stopped.
    Finished,
}

#[derive(Debug)]
struct ActivePlayback {
    timeline: Timeline,
    cursor: usize,
    started_at: f64,
    audio_duration_secs: f64,
}

impl ActivePlayback {
    fn end_time_secs(&self) -> f64 {
        self.timeline
            .last_offset_secs()
            .max(self.audio_duration_secs)
    }

    /// Move the cursor to the last entry whose offset is `<= elapsed`.
    /// Ties resolve to the later entry.
    fn advance(&mut self, elapsed: f64) {
        let entries = self.timeline.entries();
        while self.cursor + 1 < entries.len() && entries[self.cursor + 1].time_offset_secs <= elapsed
        {
            self.cursor += 1;
        }
    }
}

#[derive(Debug, Default)]
enum PlaybackState {
    #[default]
    Idle,
    Playing(ActivePlayback),
}

/// Viseme playback state machine: `Idle -> Playing -> Idle`.
#[derive(Debug)]
pub struct PlaybackSynchronizer {
    state: PlaybackState,
    grace_secs: f64,
}

impl Default for PlaybackSynchronizer {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_SECS)
    }
}

impl PlaybackSynchronizer {
    /// Negative or non-finite `grace_secs` fall back to [`DEFAULT_GRACE_SECS`].
    pub fn new(grace_secs: f64) -> Self {
        let grace_secs = if grace_secs.is_finite() && grace_secs >= 0.0 {
            grace_secs
        } else {
            warn!(grace_secs, "invalid playback grace, using default");
            DEFAULT_GRACE_SECS
        };
        Self {
            state: PlaybackState::Idle,
            grace_secs,
        }
    }

    /// Begin playing `timeline`, anchored at `now`.
    ///
    /// Any utterance already playing is stopped first. A positive
    /// `audio_duration_secs` overrides the timeline's own duration. Returns
    /// `false`, leaving the synchronizer idle, when `timeline` is empty.
    pub fn start(&mut self, timeline: Timeline, audio_duration_secs: f64, now: f64) -> bool {
        self.stop();
        if timeline.is_empty() {
            debug!("empty viseme timeline, staying idle");
            return false;
        }

        let audio_duration_secs = if audio_duration_secs.is_finite() && audio_duration_secs > 0.0 {
            audio_duration_secs
        } else {
            timeline.audio_duration_secs()
        };
        debug!(
            entries = timeline.len(),
            audio_duration_secs, "viseme playback started"
        );
        self.state = PlaybackState::Playing(ActivePlayback {
            timeline,
            cursor: 0,
            started_at: now,
            audio_duration_secs,
        });
        true
    }

    /// Advance to `now` and report the active entry.
    pub fn tick(&mut self, now: f64) -> SyncStep<'_> {
        let grace_secs = self.grace_secs;
        let finished = match &mut self.state {
            PlaybackState::Idle => return SyncStep::Idle,
            PlaybackState::Playing(active) => {
                let elapsed = now - active.started_at;
                if elapsed >= active.end_time_secs() + grace_secs {
                    true
                } else {
                    active.advance(elapsed);
                    false
                }
            }
        };

        if finished {
            debug!("viseme playback reached end of utterance");
            self.stop();
            return SyncStep::Finished;
        }

        match &self.state {
            PlaybackState::Playing(active) => match active.timeline.get(active.cursor) {
                Some(entry) => SyncStep::Active {
                    index: active.cursor,
                    entry,
                },
                None => SyncStep::Idle,
            },
            PlaybackState::Idle => SyncStep::Idle,
        }
    }

    /// Drop the current utterance. Returns whether anything was playing.
    pub fn stop(&mut self) -> bool {
        match std::mem::take(&mut self.state) {
            PlaybackState::Playing(active) => {
                debug!(cursor = active.cursor, "viseme playback stopped");
                true
            }
            PlaybackState::Idle => false,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing(_))
    }

    /// Cursor into the playing timeline.
    pub fn cursor(&self) -> Option<usize> {
        match &self.state {
            PlaybackState::Playing(active) => Some(active.cursor),
            PlaybackState::Idle => None,
        }
    }

    /// Wall-clock time playback was anchored at.
    pub fn started_at(&self) -> Option<f64> {
        match &self.state {
            PlaybackState::Playing(active) => Some(active.started_at),
            PlaybackState::Idle => None,
        }
    }

    /// Audio duration of the playing utterance; 0 when idle.
    pub fn audio_duration_secs(&self) -> f64 {
        match &self.state {
            PlaybackState::Playing(active) => active.audio_duration_secs,
            PlaybackState::Idle => 0.0,
        }
    }

    /// The playing timeline, if any.
    pub fn timeline(&self) -> Option<&Timeline> {
        match &self.state {
            PlaybackState::Playing(active) => Some(&active.timeline),
            PlaybackState::Idle => None,
        }
    }

    pub fn grace_secs(&self) -> f64 {
        self.grace_secs
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::viseme::VisemeName;

    fn timeline(steps: &[(f64, VisemeName)], duration: f64) -> Timeline {
        let entries = steps
            .iter()
            .map(|(t, v)| TimelineEntry::new(*t, *v, v.as_str()))
            .collect();
        Timeline::from_entries(entries, duration)
    }

    fn active_viseme(step: SyncStep<'_>) -> VisemeName {
        match step {
            SyncStep::Active { entry, .. } => entry.viseme,
            other => panic!("expected active step, got {other:?}"),
        }
    }

    #[test]
    fn empty_timeline_does_not_start() {
        let mut sync = PlaybackSynchronizer::default();
        assert!(!sync.start(Timeline::default(), 1.0, 0.0));
        assert!(!sync.is_playing());
        assert_eq!(sync.tick(0.1), SyncStep::Idle);
    }

    #[test]
    fn tick_emits_greatest_offset_not_after_elapsed() {
        let mut sync = PlaybackSynchronizer::default();
        let tl = timeline(
            &[(0.1, VisemeName::Aa), (0.3, VisemeName::Ou), (0.6, VisemeName::Mbp)],
            0.0,
        );
        assert!(sync.start(tl, 0.0, 0.0));

        // Before the first offset the first entry is shown.
        assert_eq!(active_viseme(sync.tick(0.05)), VisemeName::Aa);
        assert_eq!(active_viseme(sync.tick(0.3)), VisemeName::Ou);
        assert_eq!(active_viseme(sync.tick(0.59)), VisemeName::Ou);
        assert_eq!(active_viseme(sync.tick(0.6)), VisemeName::Mbp);
    }

    #[test]
    fn cursor_never_moves_backward() {
        let mut sync = PlaybackSynchronizer::default();
        let tl = timeline(&[(0.0, VisemeName::Sil), (0.2, VisemeName::Aa)], 1.0);
        sync.start(tl, 0.0, 0.0);

        sync.tick(0.25);
        assert_eq!(sync.cursor(), Some(1));
        // A clock that steps back does not rewind the cursor.
        assert_eq!(active_viseme(sync.tick(0.1)), VisemeName::Aa);
        assert_eq!(sync.cursor(), Some(1));
    }

    #[test]
    fn identical_offsets_resolve_to_later_entry() {
        let mut sync = PlaybackSynchronizer::default();
        let tl = timeline(
            &[(0.0, VisemeName::Sil), (0.2, VisemeName::Aa), (0.2, VisemeName::K)],
            0.5,
        );
        sync.start(tl, 0.0, 0.0);
        assert_eq!(active_viseme(sync.tick(0.2)), VisemeName::K);
        assert_eq!(sync.cursor(), Some(2));
    }

    #[test]
    fn stops_after_end_plus_grace() {
        let mut sync = PlaybackSynchronizer::default();
        let tl = timeline(&[(0.0, VisemeName::Aa)], 0.5);
        sync.start(tl, 0.0, 0.0);

        assert_eq!(active_viseme(sync.tick(0.54)), VisemeName::Aa);
        assert_eq!(sync.tick(0.56), SyncStep::Finished);
        assert!(!sync.is_playing());
        assert_eq!(sync.audio_duration_secs(), 0.0);
        assert_eq!(sync.tick(0.6), SyncStep::Idle);
    }

    #[test]
    fn short_duration_does_not_cut_last_viseme() {
        let mut sync = PlaybackSynchronizer::default();
        let tl = timeline(&[(0.0, VisemeName::Sil), (0.9, VisemeName::Oh)], 0.0);
        sync.start(tl, 0.4, 0.0);
        assert_eq!(active_viseme(sync.tick(0.92)), VisemeName::Oh);
    }

    #[test]
    fn explicit_duration_overrides_timeline_duration() {
        let mut sync = PlaybackSynchronizer::default();
        let tl = timeline(&[(0.0, VisemeName::Sil)], 0.3);
        sync.start(tl.clone(), 2.0, 0.0);
        assert!((sync.audio_duration_secs() - 2.0).abs() < f64::EPSILON);

        sync.start(tl, 0.0, 0.0);
        assert!((sync.audio_duration_secs() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn restart_replaces_previous_timeline() {
        let mut sync = PlaybackSynchronizer::default();
        sync.start(
            timeline(&[(0.0, VisemeName::Sil), (0.1, VisemeName::Aa)], 2.0),
            0.0,
            0.0,
        );
        assert_eq!(active_viseme(sync.tick(0.5)), VisemeName::Aa);

        sync.start(timeline(&[(0.0, VisemeName::Ou)], 1.0), 0.0, 0.5);
        assert_eq!(sync.cursor(), Some(0));
        assert_eq!(active_viseme(sync.tick(0.51)), VisemeName::Ou);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut sync = PlaybackSynchronizer::default();
        sync.start(timeline(&[(0.0, VisemeName::Sil)], 0.0), 0.0, 0.0);
        assert!(sync.stop());
        assert!(!sync.stop());
        assert_eq!(sync.cursor(), None);
        assert!(sync.timeline().is_none());
    }

    #[test]
    fn invalid_grace_falls_back_to_default() {
        for grace in [f64::INFINITY, f64::NAN, -1.0] {
            let mut sync = PlaybackSynchronizer::new(grace);
            assert_eq!(sync.grace_secs(), DEFAULT_GRACE_SECS);
            sync.start(timeline(&[(0.0, VisemeName::Aa)], 0.5), 0.5, 0.0);
            assert!(matches!(sync.tick(0.6), SyncStep::Finished));
        }
        assert_eq!(PlaybackSynchronizer::new(0.0).grace_secs(), 0.0);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1.0);
        let shared = clock.clone();
        clock.advance(0.25);
        assert!((shared.now() - 1.25).abs() < f64::EPSILON);
    }
}
