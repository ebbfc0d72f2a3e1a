//! The per-batch streaming core.
//!
//! A [`Run`] owns every piece of incremental state of one recording: the raw
//! and feature normalization histories, the projection index cache, the
//! sample counter and the running [`FeatureTable`]. Batches must arrive in
//! temporal order; each call to [`Run::process`] completes before the next.
//!
//! ```text
//! batch [C_all, T]
//!   ├─ re-reference            (methods.re_referencing)
//!   ├─ select feature channels
//!   ├─ resample                (methods.raw_resampling)
//!   ├─ raw normalization       (methods.raw_normalization, rolling window)
//!   ├─ feature estimation
//!   ├─ feature normalization   (methods.feature_normalization, rolling window)
//!   ├─ grid projection         (methods.project_cortex / project_subcortex)
//!   └─ timestamp + append row
//! ```
use std::time::Instant;

use anyhow::{bail, ensure, Context, Result};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};

use crate::channels::ChannelTable;
use crate::features::FeatureEstimator;
use crate::history::{FeatureHistory, RawHistory};
use crate::normalize::{normalize_features, normalize_raw};
use crate::projection::{Projection, ProjectionCache};
use crate::reference::{ReReferencer, Reference};
use crate::resample::{FftResampler, Resample};
use crate::settings::{NormMethod, Settings};
use crate::table::FeatureTable;

/// Lifecycle of a run. The first batch is handled inside
/// [`Run::process`] and moves the run straight to `SteadyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Uninitialized,
    SteadyState,
}

/// One emitted feature row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub time_ms: f64,
    pub values: Array1<f64>,
}

#[derive(Debug, Clone)]
struct RawNorm {
    method: NormMethod,
    clip: Option<f64>,
    history: RawHistory,
}

#[derive(Debug, Clone)]
struct FeatNorm {
    method: NormMethod,
    clip: Option<f64>,
    history: FeatureHistory,
}

pub struct Run {
    fs: f64,
    fs_processing: f64,
    sample_add: usize,
    /// Columns of a steady-state batch appended to the raw history, at the
    /// processing rate.
    raw_hop: usize,
    offset_ms: f64,
    n_channels: usize,
    feature_idx: Vec<usize>,

    reference: Option<Box<dyn Reference>>,
    resampler: Option<Box<dyn Resample>>,
    features: Box<dyn FeatureEstimator>,
    projection: Option<Box<dyn Projection>>,

    raw_norm: Option<RawNorm>,
    feat_norm: Option<FeatNorm>,

    cortex_channels: Option<Vec<String>>,
    subcortex_channels: Option<Vec<String>>,
    cache: Option<ProjectionCache>,
    proj_cortex: Vec<Array1<f64>>,
    proj_subcortex: Vec<Array1<f64>>,

    feature_names: Option<Vec<String>>,
    table: FeatureTable,
    cnt_samples: usize,
}

impl Run {
    /// Set up a run for a recording sampled at `fs` Hz.
    ///
    /// `settings` must have passed [`check_settings`](crate::check_settings).
    /// Re-referencing and resampling use [`ReReferencer`] and
    /// [`FftResampler`] unless replaced with [`with_reference`](Self::with_reference)
    /// / [`with_resampler`](Self::with_resampler). A projection collaborator is
    /// required when a projection group is enabled and has channels.
    pub fn new(
        settings: &Settings,
        channels: &ChannelTable,
        fs: f64,
        features: Box<dyn FeatureEstimator>,
        projection: Option<Box<dyn Projection>>,
    ) -> Result<Self> {
        ensure!(fs > 0.0, "sampling rate must be positive, got {fs}");
        let m = &settings.methods;
        let sample_add = settings.sample_add(fs);
        ensure!(
            sample_add > 0,
            "sampling_rate_features_hz {} is above the recording rate {fs}",
            settings.sampling_rate_features_hz
        );

        let feature_idx = channels.feature_idx();
        ensure!(!feature_idx.is_empty(), "no channel selected for feature extraction");

        let reference: Option<Box<dyn Reference>> = if m.re_referencing {
            Some(Box::new(ReReferencer::new(channels)?))
        } else {
            None
        };

        let fs_processing = settings.processing_rate(fs);
        let resampler: Option<Box<dyn Resample>> = if m.raw_resampling {
            let r = FftResampler::new(fs, fs_processing);
            (!r.is_identity()).then(|| Box::new(r) as Box<dyn Resample>)
        } else {
            None
        };
        let raw_hop = ((sample_add as f64) * fs_processing / fs).round().max(1.0) as usize;

        let raw_norm = match (&settings.raw_normalization_settings, m.raw_normalization) {
            (Some(n), true) => {
                let window = settings.raw_normalize_samples(fs_processing).unwrap_or(1).max(1);
                Some(RawNorm {
                    method: n.normalization_method,
                    clip: n.clip.magnitude(),
                    history: RawHistory::new(feature_idx.len(), window),
                })
            }
            _ => None,
        };
        let feat_norm = match (&settings.feature_normalization_settings, m.feature_normalization) {
            (Some(n), true) => {
                let window = settings.feat_normalize_samples().unwrap_or(1).max(1);
                Some(FeatNorm {
                    method: n.normalization_method,
                    clip: n.clip.magnitude(),
                    history: FeatureHistory::new(window),
                })
            }
            _ => None,
        };

        let cortex_channels = if m.project_cortex {
            non_empty_group("cortex", channels.feature_names_of_type("ecog"))
        } else {
            None
        };
        let subcortex_channels = if m.project_subcortex {
            non_empty_group("subcortex", settings.subcortex_channels().to_vec())
        } else {
            None
        };
        let projects = cortex_channels.is_some() || subcortex_channels.is_some();
        if projects && projection.is_none() {
            bail!("grid projection is enabled but no projection collaborator was given");
        }

        let offset_ms = settings.startup_offset_ms();
        log::info!(
            "run: {} feature channels, fs={fs} Hz, processing fs={fs_processing} Hz, \
             sample_add={sample_add}, offset={offset_ms} ms, raw_norm={:?}, feat_norm={:?}, projection={}",
            feature_idx.len(),
            raw_norm.as_ref().map(|n| (n.method.as_str(), n.history.capacity())),
            feat_norm.as_ref().map(|n| n.method.as_str()),
            projects,
        );

        Ok(Self {
            fs,
            fs_processing,
            sample_add,
            raw_hop,
            offset_ms,
            n_channels: channels.len(),
            feature_idx,
            reference,
            resampler,
            features,
            projection: if projects { projection } else { None },
            raw_norm,
            feat_norm,
            cortex_channels,
            subcortex_channels,
            cache: None,
            proj_cortex: Vec::new(),
            proj_subcortex: Vec::new(),
            feature_names: None,
            table: FeatureTable::default(),
            cnt_samples: 0,
        })
    }

    /// Replace the re-referencing collaborator (only used when
    /// `methods.re_referencing` is set).
    pub fn with_reference(mut self, reference: Box<dyn Reference>) -> Self {
        if self.reference.is_some() {
            self.reference = Some(reference);
        }
        self
    }

    /// Replace the resampling collaborator (only used when
    /// `methods.raw_resampling` is set and the rates differ).
    pub fn with_resampler(mut self, resampler: Box<dyn Resample>) -> Self {
        if self.resampler.is_some() {
            self.resampler = Some(resampler);
        }
        self
    }

    pub fn state(&self) -> RunState {
        if self.feature_names.is_some() {
            RunState::SteadyState
        } else {
            RunState::Uninitialized
        }
    }

    pub fn sample_add(&self) -> usize {
        self.sample_add
    }

    /// Source samples represented by the table so far.
    pub fn cnt_samples(&self) -> usize {
        self.cnt_samples
    }

    pub fn feature_table(&self) -> &FeatureTable {
        &self.table
    }

    pub fn into_table(self) -> FeatureTable {
        self.table
    }

    /// Channel-index cache, built on the first projected batch.
    pub fn projection_cache(&self) -> Option<&ProjectionCache> {
        self.cache.as_ref()
    }

    /// Projected cortex vectors, one row per batch.
    pub fn projected_cortex(&self) -> Option<Array2<f64>> {
        stack_rows(&self.proj_cortex)
    }

    /// Projected subcortex vectors, one row per batch.
    pub fn projected_subcortex(&self) -> Option<Array2<f64>> {
        stack_rows(&self.proj_subcortex)
    }

    /// Process one batch of all recorded channels (`[C_all, T]`).
    ///
    /// The first batch may have any positive length; later batches must
    /// have at least `sample_add` columns, of which the trailing ones are
    /// new samples. A rejected batch leaves the run unchanged.
    pub fn process(&mut self, batch: ArrayView2<f64>) -> Result<FeatureRow> {
        let started = Instant::now();
        let first = self.feature_names.is_none();
        let n_src = batch.ncols();
        ensure!(
            batch.nrows() == self.n_channels,
            "batch has {} channels, channel table has {}",
            batch.nrows(),
            self.n_channels
        );
        ensure!(n_src > 0, "empty batch");
        ensure!(
            first || n_src >= self.sample_add,
            "batch has {n_src} samples, expected {}",
            self.sample_add
        );

        let data = match &self.reference {
            Some(r) => r.apply(batch).context("re-referencing")?,
            None => batch.to_owned(),
        };
        let mut data = data.select(Axis(0), &self.feature_idx);
        if let Some(r) = &self.resampler {
            data = r.apply(data.view()).context("resampling")?;
        }

        let mut raw_window = None;
        if let Some(rn) = &self.raw_norm {
            let window = if rn.history.is_empty() {
                let keep = data.ncols().min(rn.history.capacity());
                data.slice(s![.., data.ncols() - keep..]).to_owned()
            } else {
                let hop = self.raw_hop.min(data.ncols());
                let fresh = data.slice(s![.., data.ncols() - hop..]);
                rn.history.window_with(fresh)
            };
            data = normalize_raw(data.view(), window.view(), rn.method, rn.clip);
            raw_window = Some(window);
        }

        let fv = self
            .features
            .estimate(data.view(), self.fs_processing)
            .context("feature estimation")?;
        if let Some(names) = &self.feature_names {
            ensure!(
                fv.len() == names.len(),
                "feature estimator returned {} features, expected {}",
                fv.len(),
                names.len()
            );
            if let Some((i, (new, old))) =
                fv.names.iter().zip(names).enumerate().find(|(_, (a, b))| a != b)
            {
                bail!("feature {i} renamed from '{old}' to '{new}' between batches");
            }
        }
        let raw_features = fv.values;

        let mut emitted = raw_features.clone();
        if let Some(fnorm) = &self.feat_norm {
            if fnorm.history.is_empty() {
                emitted.fill(0.0);
            } else {
                let window = fnorm.history.window_with(raw_features.view(), raw_features.len());
                emitted =
                    normalize_features(raw_features.view(), window.view(), fnorm.method, fnorm.clip);
            }
        }

        let mut new_cache = None;
        let mut projected = None;
        if let Some(proj) = self.projection.as_mut() {
            let built;
            let cache = match &self.cache {
                Some(c) => c,
                None => {
                    built = ProjectionCache::build(
                        self.cortex_channels.as_deref(),
                        self.subcortex_channels.as_deref(),
                        &fv.names,
                    )?;
                    new_cache = Some(built.clone());
                    &built
                }
            };
            let dat_cortex = cache.cortex.as_ref().map(|g| g.gather(emitted.view()));
            let dat_subcortex = cache.subcortex.as_ref().map(|g| g.gather(emitted.view()));
            let out = proj
                .project(
                    dat_cortex.as_ref().map(|a| a.view()),
                    dat_subcortex.as_ref().map(|a| a.view()),
                )
                .context("grid projection")?;
            projected = Some(out);
        }

        // Commit.
        let time_ms = if first {
            // The first row stands for at least the startup offset, so the
            // second row is always stamped after it.
            let offset_samples = (self.offset_ms * self.fs / 1000.0).ceil() as usize;
            if n_src < offset_samples {
                log::warn!(
                    "first batch covers {:.1} ms, less than the {} ms startup offset; \
                     counting it as {offset_samples} samples",
                    n_src as f64 * 1000.0 / self.fs,
                    self.offset_ms
                );
            }
            self.cnt_samples = n_src.max(offset_samples);
            self.offset_ms
        } else {
            self.cnt_samples += self.sample_add;
            self.cnt_samples as f64 * 1000.0 / self.fs
        };
        if let (Some(rn), Some(window)) = (self.raw_norm.as_mut(), raw_window) {
            rn.history.reset_with(window.view());
        }
        if let Some(fnorm) = self.feat_norm.as_mut() {
            fnorm.history.push(raw_features.view());
        }
        if let Some(c) = new_cache {
            self.cache = Some(c);
        }
        if let Some(p) = projected {
            if let Some(v) = p.cortex {
                self.proj_cortex.push(v);
            }
            if let Some(v) = p.subcortex {
                self.proj_subcortex.push(v);
            }
        }
        if first {
            self.table = FeatureTable::new(fv.names.clone());
            self.feature_names = Some(fv.names);
        }
        self.table.push(time_ms, emitted.clone())?;

        log::debug!(
            "{:.2} seconds of data processed, last batch took {:.2?}",
            time_ms / 1000.0,
            started.elapsed()
        );
        Ok(FeatureRow {
            time_ms,
            values: emitted,
        })
    }
}

fn non_empty_group(group: &str, channels: Vec<String>) -> Option<Vec<String>> {
    if channels.is_empty() {
        log::warn!("{group} projection enabled but no {group} channel is available, skipping it");
        None
    } else {
        Some(channels)
    }
}

fn stack_rows(rows: &[Array1<f64>]) -> Option<Array2<f64>> {
    let first = rows.first()?;
    let mut out = Array2::zeros((rows.len(), first.len()));
    for (mut dst, row) in out.rows_mut().into_iter().zip(rows) {
        dst.assign(row);
    }
    Some(out)
}
