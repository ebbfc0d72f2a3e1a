//! # nmstream: online iEEG feature streaming
//!
//! `nmstream` turns a continuous multi-channel neural recording into a time
//! series of feature vectors, one row per `1 / sampling_rate_features_hz`
//! seconds. The same per-batch core serves real-time streaming (call
//! [`Run::process`] as batches arrive) and offline replay of a complete
//! recording ([`offline::replay`]).
//!
//! ## Pipeline overview
//!
//! ```text
//! settings.json + channels.json
//!   │
//!   ├─ check::check_settings()     pre-flight contract check (fatal on error)
//!   └─ Run::new()
//!        │  per batch [C_all, T]:
//!        ├─ reference              ReReferencer: average / bipolar / none
//!        ├─ channel selection      used ∧ ¬bad ∧ ¬target
//!        ├─ resample               FftResampler → resample_freq_hz
//!        ├─ raw normalization      rolling window, mean / median / zscore + clip
//!        ├─ FeatureEstimator       opaque, ordered named vector
//!        ├─ feature normalization  rolling window over past rows, first row = 0
//!        ├─ Projection             cortex / subcortex grids, cached indices
//!        └─ FeatureTable           (time_ms, values) per batch
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use nmstream::{check_settings, ChannelTable, FeatureVector, Run, Settings};
//! use ndarray::{Array2, ArrayView2, Axis};
//!
//! let settings = Settings::from_file("nm_settings.json").unwrap();
//! let channels = ChannelTable::from_file("nm_channels.json").unwrap();
//! check_settings(&settings, &channels).unwrap();
//!
//! // Any FnMut(batch, fs) -> Result<FeatureVector> is a feature estimator.
//! let estimator = |batch: ArrayView2<f64>, _fs: f64| -> anyhow::Result<FeatureVector> {
//!     let var = batch.var_axis(Axis(1), 0.0);
//!     Ok(FeatureVector::from_pairs(
//!         var.iter().enumerate().map(|(c, &v)| (format!("ch{c}_var"), v)),
//!     ))
//! };
//!
//! let mut run = Run::new(&settings, &channels, 1000.0, Box::new(estimator), None).unwrap();
//! let batch: Array2<f64> = Array2::zeros((channels.len(), 1000));
//! let row = run.process(batch.view()).unwrap();
//! println!("t = {} ms, {} features", row.time_ms, row.values.len());
//! ```
pub mod channels;
pub mod check;
pub mod error;
pub mod features;
pub mod history;
pub mod labels;
pub mod normalize;
pub mod offline;
pub mod projection;
pub mod reference;
pub mod resample;
pub mod run;
pub mod settings;
pub mod table;

use anyhow::Result;
use ndarray::ArrayView2;

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use channels::{Channel, ChannelTable};
pub use check::check_settings;
pub use error::SettingsError;
pub use features::{FeatureEstimator, FeatureVector};
pub use history::{FeatureHistory, RawHistory};
pub use labels::{add_labels, LabelMerge};
pub use normalize::{normalize_features, normalize_raw};
pub use offline::{replay, OfflineReplay};
pub use projection::{GroupIndex, Projected, Projection, ProjectionCache};
pub use reference::{ReReferencer, Reference};
pub use resample::{resample, FftResampler, Resample};
pub use run::{FeatureRow, Run, RunState};
pub use settings::{Clip, Methods, NormMethod, Settings, DEFAULT_CLIP};
pub use table::FeatureTable;

/// Stream a **complete recording** offline and return its feature table.
///
/// 1. Validate `settings` against `channels` ([`check_settings`]).
/// 2. Build a [`Run`] for `fs`.
/// 3. Replay `recording` (`[C_all, T]`) as a seed batch of `first_samples`
///    columns (one second when `None`) followed by `sample_add` batches.
/// 4. Merge the target channels as label columns ([`add_labels`]); a
///    mismatch is logged and the table is returned without labels.
///
/// The label outcome is returned next to the table.
pub fn stream_offline(
    settings: &Settings,
    channels: &ChannelTable,
    recording: ArrayView2<f64>,
    fs: f64,
    features: Box<dyn FeatureEstimator>,
    projection: Option<Box<dyn Projection>>,
    first_samples: Option<usize>,
) -> Result<(FeatureTable, LabelMerge)> {
    check_settings(settings, channels)?;
    let run = Run::new(settings, channels, fs, features, projection)?;
    let first = first_samples.unwrap_or(fs.round() as usize);
    let mut table = replay(run, recording, Some(first))?;
    let labels = add_labels(&mut table, channels, recording, settings, fs);
    Ok((table, labels))
}
