use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid tracker settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Timing knobs of a visibility tracker, in milliseconds.
///
/// Deserializes from camelCase keys; the upper-case override names used by
/// older embed configs are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerSettings {
    /// Rate-limit window for scroll/resize/load sampling.
    #[serde(alias = "WAIT_TO_ENSURE_SCROLLING_IS_DONE")]
    pub sample_debounce_ms: u32,

    /// Continuous visibility required before an element counts as read.
    /// Zero disables read confirmation.
    #[serde(alias = "WAIT_TO_MARK_READ")]
    pub read_delay_ms: u32,

    /// Delay of the extra geometry check issued after becoming visible.
    #[serde(alias = "ANIMATION_DURATION")]
    pub re_request_delay_ms: u32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            sample_debounce_ms: 40,
            read_delay_ms: 500,
            re_request_delay_ms: 800,
        }
    }
}

impl TrackerSettings {
    /// Parse settings from JSON. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}
