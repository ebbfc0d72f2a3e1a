//! Re-referencing.
//!
//! [`Reference`] is the narrow interface the run calls before channel
//! selection. [`ReReferencer`] is the default implementation, driven by the
//! `rereference` column of the channel table:
//!
//! ```text
//! "average"      data[c] -= mean(data[k])  k: other used, non-bad channels of the same type
//! "A&B"          data[c] -= mean(data[A], data[B])   (a single name is bipolar)
//! "None" / ""    unchanged
//! ```
//!
//! The plan is resolved once from the channel table; applying it is
//! stateless across batches.
use anyhow::{ensure, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::channels::ChannelTable;
use crate::error::SettingsError;

/// Linear re-referencing of a full `[C, T]` batch (all recorded channels).
pub trait Reference {
    fn apply(&self, batch: ArrayView2<f64>) -> Result<Array2<f64>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    Keep,
    Subtract(Vec<usize>),
}

#[derive(Debug, Clone)]
pub struct ReReferencer {
    rules: Vec<Rule>,
}

impl ReReferencer {
    /// Resolve the reference rule of every channel.
    ///
    /// Unknown reference channel names are configuration errors.
    pub fn new(channels: &ChannelTable) -> Result<Self, SettingsError> {
        let mut rules = Vec::with_capacity(channels.len());
        for (i, ch) in channels.channels.iter().enumerate() {
            let rule_text = ch.rereference.trim();
            let unreferenced = rule_text.is_empty() || rule_text.eq_ignore_ascii_case("none");
            let rule = if !ch.used || ch.bad || unreferenced {
                Rule::Keep
            } else if rule_text.eq_ignore_ascii_case("average") {
                let others: Vec<usize> = channels
                    .channels
                    .iter()
                    .enumerate()
                    .filter(|(k, o)| *k != i && o.used && !o.bad && o.ch_type == ch.ch_type)
                    .map(|(k, _)| k)
                    .collect();
                if others.is_empty() {
                    log::warn!(
                        "channel {}: no other {} channel to average, left unreferenced",
                        ch.name,
                        ch.ch_type
                    );
                    Rule::Keep
                } else {
                    Rule::Subtract(others)
                }
            } else {
                let refs = rule_text
                    .split('&')
                    .map(|name| {
                        channels
                            .position(name.trim())
                            .ok_or_else(|| SettingsError::UnknownChannel {
                                owner: "rereference",
                                channel: name.trim().to_string(),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Rule::Subtract(refs)
            };
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    /// Common average reference over `n_channels` channels (each channel
    /// minus the mean of all the others).
    pub fn common_average(n_channels: usize) -> Self {
        let rules = (0..n_channels)
            .map(|i| Rule::Subtract((0..n_channels).filter(|&k| k != i).collect()))
            .collect();
        Self { rules }
    }
}

impl Reference for ReReferencer {
    fn apply(&self, batch: ArrayView2<f64>) -> Result<Array2<f64>> {
        ensure!(
            batch.nrows() == self.rules.len(),
            "re-reference expects {} channels, got {}",
            self.rules.len(),
            batch.nrows()
        );
        let mut out = batch.to_owned();
        for (c, rule) in self.rules.iter().enumerate() {
            if let Rule::Subtract(idx) = rule {
                if idx.is_empty() {
                    continue;
                }
                let refs = batch.select(Axis(0), idx);
                let mean: Array1<f64> = refs.sum_axis(Axis(0)) / idx.len() as f64;
                let mut row = out.row_mut(c);
                row -= &mean;
            }
        }
        Ok(out)
    }
}
