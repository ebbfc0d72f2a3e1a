//! Stream settings.
//!
//! [`Settings`] is the immutable, strongly typed configuration of one run.
//! It is deserialised from JSON, validated once by
//! [`check_settings`](crate::check::check_settings) and then passed by
//! reference into [`Run::new`](crate::Run::new).
//!
//! Every optional processing stage is gated by a flag in [`Methods`]; the
//! companion block of a stage (e.g. `raw_normalization_settings`) is only
//! required when its flag is set.
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Clip magnitude used when `clip` is given as `true` instead of a number.
pub const DEFAULT_CLIP: f64 = 3.0;

/// Statistic used by rolling normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormMethod {
    /// Subtract the windowed mean.
    Mean,
    /// Subtract the windowed median.
    Median,
    /// Subtract the windowed mean and divide by the windowed (population)
    /// standard deviation.
    Zscore,
}

impl NormMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormMethod::Mean => "mean",
            NormMethod::Median => "median",
            NormMethod::Zscore => "zscore",
        }
    }
}

/// Clip setting: `false`, `true` or a magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Clip {
    Flag(bool),
    Value(f64),
}

impl Default for Clip {
    fn default() -> Self {
        Clip::Flag(false)
    }
}

impl Clip {
    /// Resolved clip bound, `None` when clipping is disabled.
    ///
    /// `true` resolves to [`DEFAULT_CLIP`].
    pub fn magnitude(&self) -> Option<f64> {
        match *self {
            Clip::Flag(false) => None,
            Clip::Flag(true) => Some(DEFAULT_CLIP),
            Clip::Value(v) => Some(v),
        }
    }
}

/// One boolean per optional processing stage or feature family.
///
/// Feature families (`fft`, `bandpass_filter`, …) are consumed by the
/// feature estimator; the run itself only reads the pre- and
/// post-processing flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Methods {
    pub re_referencing: bool,
    pub raw_resampling: bool,
    pub notch_filter: bool,
    pub raw_normalization: bool,
    pub feature_normalization: bool,
    pub project_cortex: bool,
    pub project_subcortex: bool,
    pub kalman_filter: bool,
    pub fft: bool,
    pub stft: bool,
    pub bandpass_filter: bool,
    pub raw_hjorth: bool,
    pub return_raw: bool,
    pub sharpwave_analysis: bool,
    pub coherence: bool,
    pub fooof: bool,
    pub nolds: bool,
    pub bursts: bool,
}

impl Methods {
    /// All flags with their setting names, in declaration order.
    pub fn flags(&self) -> [(&'static str, bool); 18] {
        [
            ("re_referencing", self.re_referencing),
            ("raw_resampling", self.raw_resampling),
            ("notch_filter", self.notch_filter),
            ("raw_normalization", self.raw_normalization),
            ("feature_normalization", self.feature_normalization),
            ("project_cortex", self.project_cortex),
            ("project_subcortex", self.project_subcortex),
            ("kalman_filter", self.kalman_filter),
            ("fft", self.fft),
            ("stft", self.stft),
            ("bandpass_filter", self.bandpass_filter),
            ("raw_hjorth", self.raw_hjorth),
            ("return_raw", self.return_raw),
            ("sharpwave_analysis", self.sharpwave_analysis),
            ("coherence", self.coherence),
            ("fooof", self.fooof),
            ("nolds", self.nolds),
            ("bursts", self.bursts),
        ]
    }

    pub fn any(&self) -> bool {
        self.flags().iter().any(|(_, on)| *on)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampleSettings {
    /// Rate of the signal handed to normalization and feature estimation.
    pub resample_freq_hz: f64,
}

/// Rolling normalization parameters, shared by raw and feature
/// normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationSettings {
    /// Length of the rolling window in seconds.
    pub normalization_time_s: f64,
    pub normalization_method: NormMethod,
    #[serde(default)]
    pub clip: Clip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionSettings {
    pub max_dist_cm: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandpowerFeatures {
    pub activity: bool,
    pub mobility: bool,
    pub complexity: bool,
}

impl BandpowerFeatures {
    pub fn any(&self) -> bool {
        self.activity || self.mobility || self.complexity
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BandpassSettings {
    /// Filter segment length per band in milliseconds. The longest one is
    /// the time the slowest filter needs to settle.
    #[serde(default)]
    pub segment_lengths_ms: BTreeMap<String, f64>,
    #[serde(default)]
    pub bandpower_features: BandpowerFeatures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KalmanSettings {
    #[serde(rename = "Tp")]
    pub tp: f64,
    pub sigma_w: f64,
    pub sigma_v: f64,
    pub frequency_bands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharpwaveSettings {
    pub filter_low_cutoff_hz: f64,
    pub filter_high_cutoff_hz: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoherenceSettings {
    pub channels: Vec<[String; 2]>,
    pub frequency_bands: Vec<String>,
}

/// Channel names (and optionally positions) of one anatomical grid group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridChannels {
    pub ch_names: Vec<String>,
    #[serde(default)]
    pub positions: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Coordinates {
    pub cortex_left: Option<GridChannels>,
    pub cortex_right: Option<GridChannels>,
    pub subcortex_left: Option<GridChannels>,
    pub subcortex_right: Option<GridChannels>,
}

/// Full configuration of one stream.
///
/// Construct with [`Settings::from_json_str`] / [`Settings::from_file`], or
/// in code with struct-update syntax:
///
/// ```
/// use nmstream::settings::{Settings, Methods};
///
/// let s = Settings {
///     sampling_rate_features_hz: 20.0,
///     methods: Methods { fft: true, ..Methods::default() },
///     ..Settings::default()
/// };
/// assert_eq!(s.sample_add(1000.0), 50);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Rate at which feature rows are produced.
    pub sampling_rate_features_hz: f64,

    pub methods: Methods,

    pub raw_resampling_settings: Option<ResampleSettings>,
    pub raw_normalization_settings: Option<NormalizationSettings>,
    pub feature_normalization_settings: Option<NormalizationSettings>,
    pub project_cortex_settings: Option<ProjectionSettings>,
    pub project_subcortex_settings: Option<ProjectionSettings>,

    /// Named spectral bands, each `[low, high]` in Hz.
    #[serde(default)]
    pub frequency_ranges_hz: BTreeMap<String, [f64; 2]>,

    pub bandpass_filter_settings: Option<BandpassSettings>,
    pub kalman_filter_settings: Option<KalmanSettings>,
    pub sharpwave_analysis_settings: Option<SharpwaveSettings>,
    pub coherence: Option<CoherenceSettings>,

    /// Right hemisphere session. Selects which subcortical grid channel set
    /// is active for the whole run.
    #[serde(default)]
    pub sess_right: bool,

    #[serde(default)]
    pub coord: Coordinates,
}

impl Default for Settings {
    /// 10 Hz feature rate, bandpower activity over the usual bands and a
    /// 30 s rolling z-score of the features clipped at 3.
    fn default() -> Self {
        let bands: [(&str, [f64; 2], f64); 7] = [
            ("theta", [4.0, 8.0], 1000.0),
            ("alpha", [8.0, 12.0], 500.0),
            ("low beta", [13.0, 20.0], 333.0),
            ("high beta", [20.0, 35.0], 333.0),
            ("low gamma", [60.0, 80.0], 100.0),
            ("high gamma", [90.0, 200.0], 100.0),
            ("HFA", [200.0, 400.0], 100.0),
        ];
        Self {
            sampling_rate_features_hz: 10.0,
            methods: Methods {
                bandpass_filter: true,
                feature_normalization: true,
                ..Methods::default()
            },
            raw_resampling_settings: None,
            raw_normalization_settings: None,
            feature_normalization_settings: Some(NormalizationSettings {
                normalization_time_s: 30.0,
                normalization_method: NormMethod::Zscore,
                clip: Clip::Value(DEFAULT_CLIP),
            }),
            project_cortex_settings: None,
            project_subcortex_settings: None,
            frequency_ranges_hz: bands
                .iter()
                .map(|(name, range, _)| (name.to_string(), *range))
                .collect(),
            bandpass_filter_settings: Some(BandpassSettings {
                segment_lengths_ms: bands
                    .iter()
                    .map(|(name, _, seg)| (name.to_string(), *seg))
                    .collect(),
                bandpower_features: BandpowerFeatures {
                    activity: true,
                    ..BandpowerFeatures::default()
                },
            }),
            kalman_filter_settings: None,
            sharpwave_analysis_settings: None,
            coherence: None,
            sess_right: false,
            coord: Coordinates::default(),
        }
    }
}

impl Settings {
    pub fn from_json_str(s: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Source samples represented by one steady-state batch:
    /// `round(fs / sampling_rate_features_hz)`.
    pub fn sample_add(&self, fs: f64) -> usize {
        (fs / self.sampling_rate_features_hz).round() as usize
    }

    /// Rate of the signal after the (optional) resampling stage.
    pub fn processing_rate(&self, fs: f64) -> f64 {
        match (&self.raw_resampling_settings, self.methods.raw_resampling) {
            (Some(r), true) => r.resample_freq_hz,
            _ => fs,
        }
    }

    /// Raw normalization window in samples at the processing rate.
    pub fn raw_normalize_samples(&self, fs_processing: f64) -> Option<usize> {
        self.raw_normalization_settings
            .as_ref()
            .map(|n| (n.normalization_time_s * fs_processing).round() as usize)
    }

    /// Feature normalization window in rows.
    pub fn feat_normalize_samples(&self) -> Option<usize> {
        self.feature_normalization_settings
            .as_ref()
            .map(|n| (n.normalization_time_s * self.sampling_rate_features_hz).round() as usize)
    }

    /// Timestamp of the first feature row in milliseconds: the longest
    /// bandpass segment length, 0 when none is configured.
    pub fn startup_offset_ms(&self) -> f64 {
        self.bandpass_filter_settings
            .as_ref()
            .map(|b| b.segment_lengths_ms.values().copied().fold(0.0, f64::max))
            .unwrap_or(0.0)
    }

    /// Subcortical grid channels of the active hemisphere.
    pub fn subcortex_channels(&self) -> &[String] {
        let grid = if self.sess_right {
            self.coord.subcortex_right.as_ref()
        } else {
            self.coord.subcortex_left.as_ref()
        };
        grid.map(|g| g.ch_names.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_accepts_bool_and_number() {
        let off: Clip = serde_json::from_str("false").unwrap();
        let on: Clip = serde_json::from_str("true").unwrap();
        let num: Clip = serde_json::from_str("2.5").unwrap();
        assert_eq!(off.magnitude(), None);
        assert_eq!(on.magnitude(), Some(DEFAULT_CLIP));
        assert_eq!(num.magnitude(), Some(2.5));
    }

    #[test]
    fn parse_minimal_json() {
        let s = Settings::from_json_str(
            r#"{
                "sampling_rate_features_hz": 10,
                "methods": { "raw_normalization": true },
                "raw_normalization_settings": {
                    "normalization_time_s": 1.5,
                    "normalization_method": "median",
                    "clip": true
                }
            }"#,
        )
        .unwrap();
        assert!(s.methods.raw_normalization);
        assert!(!s.methods.feature_normalization);
        let raw = s.raw_normalization_settings.as_ref().unwrap();
        assert_eq!(raw.normalization_method, NormMethod::Median);
        assert_eq!(s.raw_normalize_samples(1000.0), Some(1500));
        assert_eq!(s.startup_offset_ms(), 0.0);
    }

    #[test]
    fn unknown_method_name_is_rejected() {
        let r = Settings::from_json_str(
            r#"{
                "sampling_rate_features_hz": 10,
                "methods": {},
                "feature_normalization_settings": {
                    "normalization_time_s": 1,
                    "normalization_method": "minmax"
                }
            }"#,
        );
        assert!(matches!(r, Err(SettingsError::Parse(_))));
    }

    #[test]
    fn derived_quantities() {
        let s = Settings::default();
        assert_eq!(s.sample_add(1000.0), 100);
        assert_eq!(s.feat_normalize_samples(), Some(300));
        assert_eq!(s.startup_offset_ms(), 1000.0);
        assert_eq!(s.processing_rate(1000.0), 1000.0);
    }

    #[test]
    fn active_subcortex_follows_session_side() {
        let mut s = Settings::default();
        s.coord.subcortex_left = Some(GridChannels {
            ch_names: vec!["LFP_L_1".into()],
            positions: vec![],
        });
        s.coord.subcortex_right = Some(GridChannels {
            ch_names: vec!["LFP_R_1".into(), "LFP_R_2".into()],
            positions: vec![],
        });
        assert_eq!(s.subcortex_channels(), ["LFP_L_1".to_string()]);
        s.sess_right = true;
        assert_eq!(s.subcortex_channels().len(), 2);
    }
}
