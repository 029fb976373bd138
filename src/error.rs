//! Error types for the lip-sync engine.
//!
//! Only the I/O boundary (config files, the persisted mapping document and
//! speech-service payloads) is fallible. The per-frame core never returns
//! errors; it degrades to a neutral mouth instead.

/// Top-level error type for the lip-sync engine.
#[derive(Debug, thiserror::Error)]
pub enum LipSyncError {
    /// Configuration file could not be parsed or serialized.
    #[error("config error: {0}")]
    Config(String),

    /// Persisted viseme mapping could not be encoded or written.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// Speech-service payload could not be decoded.
    #[error("utterance error: {0}")]
    Utterance(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, LipSyncError>;
