/// Shared helpers for the integration tests: stub collaborators and small
/// settings / channel tables.
use anyhow::Result;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use nmstream::settings::{BandpassSettings, NormalizationSettings};
use nmstream::{
    Channel, ChannelTable, Clip, FeatureEstimator, FeatureVector, Methods, NormMethod, Projected,
    Projection, Settings,
};
use std::cell::RefCell;
use std::rc::Rc;

#[allow(unused)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One feature per channel: the sum of the batch row, named `<ch>_sum`.
#[allow(unused)]
pub struct SumEstimator {
    pub names: Vec<String>,
}

#[allow(unused)]
impl SumEstimator {
    pub fn new(channels: &[&str]) -> Self {
        Self {
            names: channels.iter().map(|c| format!("{c}_sum")).collect(),
        }
    }
}

impl FeatureEstimator for SumEstimator {
    fn estimate(&mut self, batch: ArrayView2<f64>, _fs: f64) -> Result<FeatureVector> {
        Ok(FeatureVector::new(self.names.clone(), batch.sum_axis(Axis(1))))
    }
}

/// Two features per channel (`<ch>_sum`, `<ch>_max`).
#[allow(unused)]
pub struct SumMaxEstimator {
    pub channels: Vec<String>,
}

impl FeatureEstimator for SumMaxEstimator {
    fn estimate(&mut self, batch: ArrayView2<f64>, _fs: f64) -> Result<FeatureVector> {
        let mut pairs = Vec::new();
        for (ch, row) in self.channels.iter().zip(batch.rows()) {
            pairs.push((format!("{ch}_sum"), row.sum()));
            pairs.push((format!("{ch}_max"), row.fold(f64::NEG_INFINITY, |a, &b| a.max(b))));
        }
        Ok(FeatureVector::from_pairs(pairs))
    }
}

/// Records every input it is handed and projects each group to the column
/// means of its `[channels, features]` matrix.
#[allow(unused)]
#[derive(Clone, Default)]
pub struct RecordingProjection {
    pub cortex_inputs: Rc<RefCell<Vec<Array2<f64>>>>,
}

impl Projection for RecordingProjection {
    fn project(
        &mut self,
        cortex: Option<ArrayView2<f64>>,
        subcortex: Option<ArrayView2<f64>>,
    ) -> Result<Projected> {
        if let Some(c) = cortex {
            self.cortex_inputs.borrow_mut().push(c.to_owned());
        }
        Ok(Projected {
            cortex: cortex.and_then(channel_mean),
            subcortex: subcortex.and_then(channel_mean),
        })
    }
}

fn channel_mean(m: ArrayView2<f64>) -> Option<Array1<f64>> {
    m.mean_axis(Axis(0))
}

#[allow(unused)]
pub fn ecog_channels(names: &[&str]) -> ChannelTable {
    ChannelTable::new(names.iter().map(|n| Channel::new(n, "ecog")).collect())
}

#[allow(unused)]
pub fn norm(seconds: f64, method: NormMethod, clip: Clip) -> Option<NormalizationSettings> {
    Some(NormalizationSettings {
        normalization_time_s: seconds,
        normalization_method: method,
        clip,
    })
}

/// 5 Hz features from a 10 Hz recording: mean raw normalization over four
/// samples clipped at 3, z-scored features over three rows, 100 ms offset.
#[allow(unused)]
pub fn small_settings() -> Settings {
    Settings {
        sampling_rate_features_hz: 5.0,
        methods: Methods {
            raw_normalization: true,
            feature_normalization: true,
            fft: true,
            ..Methods::default()
        },
        raw_normalization_settings: norm(0.4, NormMethod::Mean, Clip::Value(3.0)),
        feature_normalization_settings: norm(0.6, NormMethod::Zscore, Clip::Flag(false)),
        bandpass_filter_settings: Some(BandpassSettings {
            segment_lengths_ms: [("beta".to_string(), 100.0)].into_iter().collect(),
            ..BandpassSettings::default()
        }),
        ..Settings::default()
    }
}

/// Deterministic pseudo-random recording `[n_ch, n_t]`.
#[allow(unused)]
pub fn noise(n_ch: usize, n_t: usize, seed: u64) -> Array2<f64> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    Array2::from_shape_fn((n_ch, n_t), |_| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
    })
}
