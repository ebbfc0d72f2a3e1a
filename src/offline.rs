//! Offline replay of a complete recording.
//!
//! The recording `[C_all, T]` is cut into a seed batch of `first_samples`
//! columns followed by consecutive `sample_add`-column batches, exactly as a
//! real-time source would deliver them. A trailing partial batch is dropped.
use anyhow::{ensure, Result};
use ndarray::{s, ArrayView2};

use crate::run::Run;
use crate::table::FeatureTable;

/// Batch iterator over a recording.
#[derive(Debug, Clone)]
pub struct OfflineReplay<'a> {
    data: ArrayView2<'a, f64>,
    first_samples: usize,
    sample_add: usize,
    pos: usize,
}

impl<'a> OfflineReplay<'a> {
    pub fn new(data: ArrayView2<'a, f64>, first_samples: usize, sample_add: usize) -> Result<Self> {
        ensure!(first_samples > 0, "seed batch must have at least one sample");
        ensure!(sample_add > 0, "sample_add must be positive");
        Ok(Self {
            data,
            first_samples,
            sample_add,
            pos: 0,
        })
    }

    /// Number of batches the replay yields.
    pub fn n_batches(&self) -> usize {
        let t = self.data.ncols();
        if t < self.first_samples {
            0
        } else {
            1 + (t - self.first_samples) / self.sample_add
        }
    }
}

impl<'a> Iterator for OfflineReplay<'a> {
    type Item = ArrayView2<'a, f64>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = if self.pos == 0 {
            self.first_samples
        } else {
            self.sample_add
        };
        let end = self.pos + len;
        if end > self.data.ncols() {
            return None;
        }
        let batch = self.data.slice_move(s![.., self.pos..end]);
        self.pos = end;
        Some(batch)
    }
}

/// Drive `run` over every batch of `recording` and return the finished
/// feature table.
///
/// `first_samples` is the length of the seed batch; `None` seeds with one
/// steady-state batch.
pub fn replay(
    mut run: Run,
    recording: ArrayView2<f64>,
    first_samples: Option<usize>,
) -> Result<FeatureTable> {
    let sample_add = run.sample_add();
    let batches = OfflineReplay::new(recording, first_samples.unwrap_or(sample_add), sample_add)?;
    let n = batches.n_batches();
    log::info!("offline replay: {n} batches of {sample_add} samples");
    for (i, batch) in batches.enumerate() {
        run.process(batch)
            .map_err(|e| e.context(format!("batch {i} of {n}")))?;
    }
    Ok(run.into_table())
}
