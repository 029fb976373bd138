//! Speech-service response boundary.
//!
//! The service returns the spoken text, the synthesized audio as a data URL,
//! and the viseme events collected while synthesizing:
//!
//! ```json
//! {"answer_text": "...", "audio_base64": "data:audio/wav;base64,...",
//!  "visemes": [{"time": 0.0, "visemeId": 0}, ...]}
//! ```

use crate::error::{LipSyncError, Result};
use crate::viseme::VisemeEvent;
use serde::{Deserialize, Serialize};

/// One synthesized utterance as returned by the speech service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Utterance {
    /// Text that was spoken.
    pub answer_text: String,
    /// Audio payload, usually a `data:audio/wav;base64,` URL.
    pub audio_base64: String,
    /// Viseme events in time order.
    pub visemes: Vec<VisemeEvent>,
}

impl Utterance {
    /// Decode a service response body.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid response document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| LipSyncError::Utterance(format!("invalid speech response: {e}")))
    }

    /// Read and decode a saved service response.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Offset of the last viseme event, 0 when there are none.
    pub fn last_event_secs(&self) -> f64 {
        self.visemes.last().map_or(0.0, |e| e.time_offset_secs)
    }

    /// Duration to play for: the measured audio duration when the player
    /// reports one, otherwise the last event's offset.
    pub fn playable_duration(&self, measured_secs: Option<f64>) -> f64 {
        measured_secs
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or_else(|| self.last_event_secs())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    const RESPONSE: &str = r#"{
        "answer_text": "hello",
        "audio_base64": "data:audio/wav;base64,UklGRg==",
        "visemes": [
            {"time": 0.0, "visemeId": 0},
            {"time": 0.087, "visemeId": 4},
            {"time": 0.312, "visemeId": 0}
        ]
    }"#;

    #[test]
    fn decodes_service_response() {
        let utterance = Utterance::from_json(RESPONSE).unwrap();
        assert_eq!(utterance.answer_text, "hello");
        assert_eq!(utterance.visemes.len(), 3);
        assert_eq!(utterance.visemes[1].viseme_id, 4);
        assert!((utterance.last_event_secs() - 0.312).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_visemes_decode_as_empty() {
        let utterance = Utterance::from_json(r#"{"answer_text":"hi"}"#).unwrap();
        assert!(utterance.visemes.is_empty());
        assert_eq!(utterance.playable_duration(None), 0.0);
    }

    #[test]
    fn playable_duration_prefers_measured_audio() {
        let utterance = Utterance::from_json(RESPONSE).unwrap();
        assert!((utterance.playable_duration(Some(1.5)) - 1.5).abs() < f64::EPSILON);
        assert!((utterance.playable_duration(Some(f64::NAN)) - 0.312).abs() < f64::EPSILON);
        assert!((utterance.playable_duration(None) - 0.312).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_response_is_an_error() {
        let err = Utterance::from_json("{\"visemes\": 3}").unwrap_err();
        assert!(matches!(err, LipSyncError::Utterance(_)));
    }
}
