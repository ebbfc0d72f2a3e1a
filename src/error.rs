//! Configuration errors.
//!
//! Everything here is detected once, before the first batch, and is fatal:
//! processing never starts with a [`SettingsError`].
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("method '{method}' is enabled but '{block}' is missing")]
    MissingBlock {
        method: &'static str,
        block: &'static str,
    },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("no method enabled; set at least one method to true")]
    NoMethodEnabled,

    #[error("bandpass filter enabled but no bandpower feature is set")]
    NoBandpowerFeature,

    #[error("no channel is selected for feature extraction")]
    NoFeatureChannels,

    #[error("{owner} references unknown frequency band '{band}'")]
    UnknownFrequencyBand { owner: &'static str, band: String },

    #[error("{owner} references unknown channel '{channel}'")]
    UnknownChannel { owner: &'static str, channel: String },

    #[error("no feature is prefixed by projection channel '{channel}'")]
    ProjectionChannelUnmatched { channel: String },

    #[error(
        "projection channel '{channel}' has {actual} features, expected {expected} like the other channels"
    )]
    ProjectionShapeMismatch {
        channel: String,
        expected: usize,
        actual: usize,
    },
}

impl SettingsError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SettingsError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
