//! Configuration types for the lip-sync engine.

use crate::playback::DEFAULT_GRACE_SECS;
use crate::timeline::DEFAULT_CLOSED_MOUTH_SHAPE;
use crate::viseme::cache::DEFAULT_SHAPE_NAMESPACE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LipSyncConfig {
    /// Playback timing settings.
    pub playback: PlaybackConfig,
    /// Viseme mapping settings.
    pub mapping: MappingConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Playback timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Seconds past the end of an utterance before playback stops.
    ///
    /// Absorbs audio-engine scheduling jitter so the last viseme is not cut
    /// short when the audio clock runs slightly behind the wall clock.
    pub grace_secs: f64,
    /// Frame rate used by hosts that drive `tick` themselves (the replay tool).
    pub frame_rate_hz: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            grace_secs: DEFAULT_GRACE_SECS,
            frame_rate_hz: 60,
        }
    }
}

impl PlaybackConfig {
    /// Frame interval in seconds. A zero frame rate is treated as 60 Hz.
    pub fn frame_interval_secs(&self) -> f64 {
        let hz = if self.frame_rate_hz == 0 {
            60
        } else {
            self.frame_rate_hz
        };
        1.0 / f64::from(hz)
    }
}

/// Viseme mapping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Saved mapping document (None = `lipsync_dirs::mapping_file()`).
    pub path: Option<PathBuf>,
    /// Prefix tried when a key has no exact cache entry (`viseme_aa`).
    pub shape_namespace: String,
    /// Shape recorded for a viseme when neither it nor silence is mapped.
    pub closed_mouth_shape: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            path: None,
            shape_namespace: DEFAULT_SHAPE_NAMESPACE.to_owned(),
            closed_mouth_shape: DEFAULT_CLOSED_MOUTH_SHAPE.to_owned(),
        }
    }
}

impl MappingConfig {
    /// Where the mapping document is read from and saved to.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(crate::lipsync_dirs::mapping_file)
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "lipsync=info".to_owned(),
        }
    }
}

impl LipSyncConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::LipSyncError::Config(e.to_string()))
    }

    /// Load from `path` when it exists, otherwise return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &std::path::Path) -> crate::error::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::LipSyncError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/lipsync/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::lipsync_dirs::config_file()
    }
}
