//! Spatial projection of per-channel features onto anatomical grids.
//!
//! The geometry (distance weights, grid points) lives behind the
//! [`Projection`] trait. The run only groups the feature vector per
//! anatomical channel, which [`ProjectionCache`] resolves once from the
//! first feature vector's names and reuses for every later batch.
use std::ops::Range;

use anyhow::Result;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::SettingsError;

/// One projected vector per enabled group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projected {
    pub cortex: Option<Array1<f64>>,
    pub subcortex: Option<Array1<f64>>,
}

/// Grid projection collaborator.
///
/// Each data matrix is `[channels, features_per_channel]`, channels in the
/// order of the group's channel list; `None` for a group that is not
/// projected this run.
pub trait Projection {
    fn project(
        &mut self,
        cortex: Option<ArrayView2<f64>>,
        subcortex: Option<ArrayView2<f64>>,
    ) -> Result<Projected>;
}

/// Feature-vector positions of every channel of one group.
///
/// Positions are stored flat; `spans[i]` is the slice of `indices` owned by
/// `channels[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupIndex {
    channels: Vec<String>,
    indices: Vec<usize>,
    spans: Vec<Range<usize>>,
    per_channel: usize,
}

impl GroupIndex {
    /// Resolve the positions of features named `<channel>_…` for every
    /// channel, from the feature name ordering.
    pub fn build(channels: &[String], feature_names: &[String]) -> Result<Self, SettingsError> {
        let mut indices = Vec::new();
        let mut spans = Vec::with_capacity(channels.len());
        let mut per_channel = None;
        for ch in channels {
            let prefix = format!("{ch}_");
            let start = indices.len();
            indices.extend(
                feature_names
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| n.starts_with(&prefix))
                    .map(|(i, _)| i),
            );
            let n = indices.len() - start;
            if n == 0 {
                return Err(SettingsError::ProjectionChannelUnmatched { channel: ch.clone() });
            }
            match per_channel {
                None => per_channel = Some(n),
                Some(expected) if expected != n => {
                    return Err(SettingsError::ProjectionShapeMismatch {
                        channel: ch.clone(),
                        expected,
                        actual: n,
                    })
                }
                Some(_) => {}
            }
            spans.push(start..indices.len());
        }
        Ok(Self {
            channels: channels.to_vec(),
            indices,
            spans,
            per_channel: per_channel.unwrap_or(0),
        })
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Feature positions of channel `i`.
    pub fn channel_indices(&self, i: usize) -> &[usize] {
        &self.indices[self.spans[i].clone()]
    }

    /// `[channels, features_per_channel]` matrix gathered from `features`.
    pub fn gather(&self, features: ArrayView1<f64>) -> Array2<f64> {
        Array2::from_shape_fn((self.channels.len(), self.per_channel), |(c, k)| {
            features[self.indices[self.spans[c].start + k]]
        })
    }
}

/// Index cache for all projected groups of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionCache {
    pub cortex: Option<GroupIndex>,
    pub subcortex: Option<GroupIndex>,
}

impl ProjectionCache {
    pub fn build(
        cortex_channels: Option<&[String]>,
        subcortex_channels: Option<&[String]>,
        feature_names: &[String],
    ) -> Result<Self, SettingsError> {
        Ok(Self {
            cortex: cortex_channels
                .map(|c| GroupIndex::build(c, feature_names))
                .transpose()?,
            subcortex: subcortex_channels
                .map(|c| GroupIndex::build(c, feature_names))
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn prefix_match_does_not_bleed_into_longer_names() {
        let features = names(&["E_1_theta", "E_10_theta", "E_1_beta", "E_10_beta"]);
        let idx = GroupIndex::build(&names(&["E_1", "E_10"]), &features).unwrap();
        assert_eq!(idx.channel_indices(0), &[0, 2]);
        assert_eq!(idx.channel_indices(1), &[1, 3]);
        let m = idx.gather(arr1(&[1.0, 2.0, 3.0, 4.0]).view());
        assert_eq!(m, ndarray::arr2(&[[1.0, 3.0], [2.0, 4.0]]));
    }

    #[test]
    fn missing_channel_is_config_error() {
        let features = names(&["E_1_theta"]);
        let err = GroupIndex::build(&names(&["E_1", "E_2"]), &features).unwrap_err();
        assert!(matches!(err, SettingsError::ProjectionChannelUnmatched { channel } if channel == "E_2"));
    }

    #[test]
    fn uneven_feature_counts_rejected() {
        let features = names(&["A_x", "A_y", "B_x"]);
        let err = GroupIndex::build(&names(&["A", "B"]), &features).unwrap_err();
        assert!(matches!(err, SettingsError::ProjectionShapeMismatch { expected: 2, actual: 1, .. }));
    }
}
