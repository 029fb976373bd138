//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Config | `~/Library/Application Support/lipsync/` | `~/.config/lipsync/` |
//! | Data | `~/Library/Application Support/lipsync/` | `~/.local/share/lipsync/` |
//!
//! # Environment Overrides
//!
//! - `LIPSYNC_CONFIG_DIR` — overrides [`config_dir`]
//! - `LIPSYNC_DATA_DIR` — overrides [`data_dir`]

use std::path::PathBuf;

/// File name of the saved viseme mapping document.
pub const MAPPING_FILE_NAME: &str = "viseme_mapping.json";

/// Application config directory.
///
/// Holds `config.toml` and the saved viseme mapping.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("LIPSYNC_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("lipsync"))
        .unwrap_or_else(|| PathBuf::from("/tmp/lipsync-config"))
}

/// Application data directory (replay output, diagnostics).
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("LIPSYNC_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("lipsync"))
        .unwrap_or_else(|| PathBuf::from("/tmp/lipsync-data"))
}

/// Config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Saved viseme mapping path (`config_dir()/viseme_mapping.json`).
#[must_use]
pub fn mapping_file() -> PathBuf {
    config_dir().join(MAPPING_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_under_config_dir() {
        let dir = config_dir();
        assert!(config_file().starts_with(&dir));
        assert!(mapping_file().starts_with(&dir));
        assert!(mapping_file().ends_with(MAPPING_FILE_NAME));
    }
}
