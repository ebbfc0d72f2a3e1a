//! Channel table.
//!
//! One row per channel of the raw recording, in recording order. The table
//! fixes, for the whole run, which channels feed feature extraction, which
//! are targets (labels) and which are bad.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// One row of the channel table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    /// Re-referencing rule: `"average"`, `"None"` / empty, or channel names
    /// joined by `&`.
    #[serde(default)]
    pub rereference: String,
    /// Signal type, e.g. `"ecog"`, `"seeg"`, `"dbs"`, `"misc"`.
    #[serde(rename = "type")]
    pub ch_type: String,
    /// Used for feature extraction.
    #[serde(default)]
    pub used: bool,
    /// Label channel, never a feature source.
    #[serde(default)]
    pub target: bool,
    #[serde(default)]
    pub bad: bool,
}

impl Channel {
    pub fn new(name: &str, ch_type: &str) -> Self {
        Self {
            name: name.to_string(),
            rereference: String::new(),
            ch_type: ch_type.to_string(),
            used: true,
            target: false,
            bad: false,
        }
    }

    /// Channel contributes to feature extraction.
    pub fn is_feature(&self) -> bool {
        self.used && !self.bad && !self.target
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelTable {
    pub channels: Vec<Channel>,
}

impl ChannelTable {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    pub fn from_json_str(s: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name == name)
    }

    /// Row indices of the feature channels, in table order.
    pub fn feature_idx(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_feature())
            .map(|(i, _)| i)
            .collect()
    }

    /// Row indices of the target (label) channels.
    pub fn target_idx(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.target)
            .map(|(i, _)| i)
            .collect()
    }

    /// Names of the feature channels of type `ch_type`, in table order.
    pub fn feature_names_of_type(&self, ch_type: &str) -> Vec<String> {
        self.channels
            .iter()
            .filter(|c| c.is_feature() && c.ch_type == ch_type)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn is_feature_channel(&self, name: &str) -> bool {
        self.channels.iter().any(|c| c.name == name && c.is_feature())
    }
}
