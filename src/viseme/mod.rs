//! Viseme vocabulary and timestamped viseme events.
//!
//! A viseme is a visual mouth shape that corresponds to a phoneme (sound).
//! The speech service reports visemes as small numeric ids; this module maps
//! those ids onto a fixed, closed set of names that the rest of the engine
//! (mapping table, shape index cache, timeline) keys on.

pub mod cache;
pub mod mapping;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Service audio offsets are reported in 100-nanosecond ticks.
const TICKS_PER_SECOND: f64 = 10_000_000.0;

/// Closed viseme vocabulary reported by the speech service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisemeName {
    /// Silence (mouth at rest)
    Sil,
    /// Open vowels: /æ/, /ə/, /ʌ/, /ɑ/, /aɪ/
    Aa,
    /// /eɪ/, /ɛ/
    Ee,
    /// /i/, /ɪ/
    Ih,
    /// /ɔ/, /oʊ/
    Oh,
    /// /u/, /ʊ/ (rounded)
    Ou,
    /// /w/
    W,
    /// /m/ (lips closed)
    M,
    /// /f/, /v/ (teeth on lip)
    Fv,
    /// /l/
    L,
    /// /m/, /b/, /p/ (lips pressed together)
    Mbp,
    /// /tʃ/, /dʒ/, /ʃ/, /ʒ/
    Ch,
    /// /θ/
    Th,
    /// /ð/
    Dh,
    /// /r/
    R,
    /// /s/, /z/
    Sx,
    /// /k/, /g/, /ŋ/
    K,
    /// /t/, /d/, /n/
    T,
    /// /dz/
    Dz,
    /// Id or name outside the vocabulary. Always treated as silence downstream.
    Unknown,
}

impl VisemeName {
    /// Every name in the vocabulary, excluding [`VisemeName::Unknown`].
    pub const KNOWN: [VisemeName; 19] = [
        Self::Sil,
        Self::Aa,
        Self::Ee,
        Self::Ih,
        Self::Oh,
        Self::Ou,
        Self::W,
        Self::M,
        Self::Fv,
        Self::L,
        Self::Mbp,
        Self::Ch,
        Self::Th,
        Self::Dh,
        Self::R,
        Self::Sx,
        Self::K,
        Self::T,
        Self::Dz,
    ];

    /// Resolve a service viseme id. Ids 0..=21 are defined; ids 1/2/13 share
    /// the open-vowel class and 0/12 both mean silence.
    pub fn from_id(id: u32) -> Self {
        match id {
            0 | 12 => Self::Sil,
            1 | 2 | 13 => Self::Aa,
            3 => Self::Ee,
            4 => Self::Ih,
            5 => Self::Oh,
            6 => Self::Ou,
            7 => Self::W,
            8 => Self::M,
            9 => Self::Fv,
            10 => Self::L,
            11 => Self::Mbp,
            14 => Self::Ch,
            15 => Self::Th,
            16 => Self::Dh,
            17 => Self::R,
            18 => Self::Sx,
            19 => Self::K,
            20 => Self::T,
            21 => Self::Dz,
            _ => Self::Unknown,
        }
    }

    /// Resolve a name as used in the mapping document (`"aa"`, `"sil"`, ...).
    pub fn from_name(name: &str) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|v| v.as_str() == name)
            .unwrap_or(Self::Unknown)
    }

    /// Key used for this viseme in the mapping table and shape index cache.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sil => "sil",
            Self::Aa => "aa",
            Self::Ee => "ee",
            Self::Ih => "ih",
            Self::Oh => "oh",
            Self::Ou => "ou",
            Self::W => "w",
            Self::M => "m",
            Self::Fv => "fv",
            Self::L => "l",
            Self::Mbp => "mbp",
            Self::Ch => "ch",
            Self::Th => "th",
            Self::Dh => "dh",
            Self::R => "r",
            Self::Sx => "sx",
            Self::K => "k",
            Self::T => "t",
            Self::Dz => "dz",
            Self::Unknown => "unknown",
        }
    }

    /// Key to look up in the mapping table and shape index cache.
    ///
    /// Unknown ids always resolve as silence, whatever a saved mapping holds
    /// under `"unknown"`.
    pub fn lookup_key(self) -> &'static str {
        match self {
            Self::Unknown => Self::Sil.as_str(),
            other => other.as_str(),
        }
    }
}

impl fmt::Display for VisemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped viseme as produced by the speech service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisemeEvent {
    /// Offset from the start of the utterance audio, in seconds.
    #[serde(rename = "time")]
    pub time_offset_secs: f64,
    /// Service viseme id.
    #[serde(rename = "visemeId")]
    pub viseme_id: u32,
}

impl VisemeEvent {
    pub fn new(time_offset_secs: f64, viseme_id: u32) -> Self {
        Self {
            time_offset_secs,
            viseme_id,
        }
    }

    /// Build an event from a service audio offset in 100-ns ticks.
    ///
    /// The offset is rounded to whole milliseconds, matching what the service
    /// bridge forwards to clients.
    pub fn from_audio_offset_ticks(ticks: u64, viseme_id: u32) -> Self {
        let secs = ticks as f64 / TICKS_PER_SECOND;
        Self::new((secs * 1000.0).round() / 1000.0, viseme_id)
    }

    /// Resolve this event's id, logging ids outside the vocabulary.
    pub fn viseme(&self) -> VisemeName {
        let name = VisemeName::from_id(self.viseme_id);
        if name == VisemeName::Unknown {
            warn!(
                viseme_id = self.viseme_id,
                time = self.time_offset_secs,
                "unknown viseme id, falling back to silence"
            );
        }
        name
    }
}
