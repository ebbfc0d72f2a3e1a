//! Merging target (label) channels into a finished feature table.
//!
//! Targets are recorded alongside the neural channels. They are aligned with
//! the feature rows by dropping the startup offset and keeping every
//! `ceil(fs / sampling_rate_features_hz)`-th sample. When the lengths do not
//! line up the merge is skipped and reported; the feature table is never
//! left half-merged.
use ndarray::{s, ArrayView2};

use crate::channels::ChannelTable;
use crate::settings::Settings;
use crate::table::FeatureTable;

/// Result of [`add_labels`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelMerge {
    /// Columns added, one per target channel.
    Merged(Vec<String>),
    NoTarget,
    /// Downsampled label length differs from the table's row count.
    LengthMismatch { labels: usize, rows: usize },
}

/// Append the downsampled target channels of `recording` (`[C_all, T]`,
/// sampled at `fs`) to `table`.
pub fn add_labels(
    table: &mut FeatureTable,
    channels: &ChannelTable,
    recording: ArrayView2<f64>,
    settings: &Settings,
    fs: f64,
) -> LabelMerge {
    let targets = channels.target_idx();
    if targets.is_empty() {
        log::info!("no target channel specified, nothing to merge");
        return LabelMerge::NoTarget;
    }

    let offset_start = (settings.startup_offset_ms() / 1000.0 * fs).ceil() as usize;
    let step = (fs / settings.sampling_rate_features_hz).ceil().max(1.0) as usize;
    let start = offset_start.min(recording.ncols());
    let labels = recording.slice(s![.., start..;step]);

    if labels.ncols() != table.n_rows() {
        log::warn!(
            "label length {} does not match {} feature rows, labels not merged",
            labels.ncols(),
            table.n_rows()
        );
        return LabelMerge::LengthMismatch {
            labels: labels.ncols(),
            rows: table.n_rows(),
        };
    }

    let mut merged = Vec::with_capacity(targets.len());
    for &t in &targets {
        let name = &channels.channels[t].name;
        if let Err(e) = table.add_column(name, labels.row(t)) {
            log::warn!("label '{name}' not merged: {e}");
            continue;
        }
        merged.push(name.clone());
    }
    LabelMerge::Merged(merged)
}
