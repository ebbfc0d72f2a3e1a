//! Feature estimator interface.
//!
//! The run treats feature computation as one opaque call per batch returning
//! an ordered, named vector. Names must be identical (same order) for every
//! batch of a run: the projection index cache is built from the first one.
use anyhow::Result;
use ndarray::{Array1, ArrayView2};

/// Ordered feature names and their values for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub names: Vec<String>,
    pub values: Array1<f64>,
}

impl FeatureVector {
    /// Panics if `names` and `values` differ in length.
    pub fn new(names: Vec<String>, values: Array1<f64>) -> Self {
        assert_eq!(names.len(), values.len(), "one value per feature name");
        Self { names, values }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let (names, values): (Vec<String>, Vec<f64>) =
            pairs.into_iter().map(|(n, v)| (n.into(), v)).unzip();
        Self {
            names,
            values: Array1::from(values),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }
}

/// Computes features for one pre-processed `[C, T]` batch.
///
/// Rows of `batch` are the feature channels in channel-table order, at
/// `fs` Hz (the processing rate after resampling).
pub trait FeatureEstimator {
    fn estimate(&mut self, batch: ArrayView2<f64>, fs: f64) -> Result<FeatureVector>;
}

impl<F> FeatureEstimator for F
where
    F: FnMut(ArrayView2<f64>, f64) -> Result<FeatureVector>,
{
    fn estimate(&mut self, batch: ArrayView2<f64>, fs: f64) -> Result<FeatureVector> {
        self(batch, fs)
    }
}
