//! lipsync: viseme-driven mouth animation for morph-target faces.
//!
//! Given the viseme events a speech service reports alongside synthesized
//! audio, this crate decides which mouth shape a face mesh should show on
//! every rendered frame:
//!
//! - **Mapping table**: viseme name → mesh shape key, with user overrides
//! - **Shape index cache**: viseme name → morph-target slot for the loaded mesh
//! - **Timeline**: per-utterance step function of (offset, viseme)
//! - **Playback synchronizer**: wall-clock cursor over the timeline
//! - **Influence applicator**: one shape at full weight, everything else zero
//!
//! [`LipSyncEngine`] ties them together as a single context object the host's
//! render loop owns. Nothing in the per-frame path performs I/O or blocks.

pub mod config;
pub mod engine;
pub mod error;
pub mod influence;
pub mod lipsync_dirs;
pub mod playback;
pub mod timeline;
pub mod utterance;
pub mod viseme;

pub use config::LipSyncConfig;
pub use engine::{LipSyncEngine, TickOutcome};
pub use error::{LipSyncError, Result};
pub use influence::{FaceMesh, MorphTargets, ShapeDictionary};
pub use playback::{Clock, ManualClock, PlaybackSynchronizer, SystemClock};
pub use timeline::{Timeline, TimelineEntry};
pub use utterance::Utterance;
pub use viseme::cache::ShapeIndexCache;
pub use viseme::mapping::MappingTable;
pub use viseme::{VisemeEvent, VisemeName};
