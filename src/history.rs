//! Rolling histories for normalization.
//!
//! [`RawHistory`] is a fixed-capacity column ring buffer `[C, W]` holding the
//! most recent `W` raw samples per channel. [`FeatureHistory`] is a capped
//! deque of past feature rows. Memory is `O(window)`, not `O(run length)`.
use std::collections::VecDeque;

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};

/// Column ring buffer of raw samples.
#[derive(Debug, Clone)]
pub struct RawHistory {
    buf: Array2<f64>,
    /// Column the next sample is written to.
    head: usize,
    len: usize,
}

impl RawHistory {
    pub fn new(n_channels: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "raw history capacity must be > 0");
        Self {
            buf: Array2::zeros((n_channels, capacity)),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.ncols()
    }

    /// Number of valid columns, at most [`capacity`](Self::capacity).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop everything and seed the buffer with `data` (its trailing
    /// `capacity` columns when longer).
    pub fn reset_with(&mut self, data: ArrayView2<f64>) {
        self.head = 0;
        self.len = 0;
        self.push(data);
    }

    /// Append the columns of `data`, overwriting the oldest ones.
    pub fn push(&mut self, data: ArrayView2<f64>) {
        assert_eq!(data.nrows(), self.buf.nrows(), "channel count mismatch");
        let cap = self.capacity();
        let n = data.ncols();
        let skip = n.saturating_sub(cap);
        for col in data.slice(s![.., skip..]).columns() {
            self.buf.column_mut(self.head).assign(&col);
            self.head = (self.head + 1) % cap;
        }
        self.len = (self.len + n - skip).min(cap);
    }

    /// The valid window, oldest column first.
    pub fn window(&self) -> Array2<f64> {
        let cap = self.capacity();
        let start = (self.head + cap - self.len) % cap;
        let mut out = Array2::zeros((self.buf.nrows(), self.len));
        for (k, mut dst) in out.columns_mut().into_iter().enumerate() {
            dst.assign(&self.buf.column((start + k) % cap));
        }
        out
    }

    /// The window as it will be once `fresh` is pushed, without modifying
    /// the buffer.
    pub fn window_with(&self, fresh: ArrayView2<f64>) -> Array2<f64> {
        let cap = self.capacity();
        let n_new = fresh.ncols().min(cap);
        let n_old = (cap - n_new).min(self.len);
        let old = self.window();
        let mut out = Array2::zeros((self.buf.nrows(), n_old + n_new));
        out.slice_mut(s![.., ..n_old])
            .assign(&old.slice(s![.., old.ncols() - n_old..]));
        out.slice_mut(s![.., n_old..])
            .assign(&fresh.slice(s![.., fresh.ncols() - n_new..]));
        out
    }
}

/// Capped deque of feature rows.
#[derive(Debug, Clone)]
pub struct FeatureHistory {
    rows: VecDeque<Array1<f64>>,
    capacity: usize,
}

impl FeatureHistory {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "feature history capacity must be > 0");
        Self {
            rows: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: ArrayView1<f64>) {
        if self.rows.len() == self.capacity {
            self.rows.pop_front();
        }
        self.rows.push_back(row.to_owned());
    }

    /// Rows as they will be once `row` is pushed, stacked `[R, F]` oldest
    /// first, without modifying the history.
    pub fn window_with(&self, row: ArrayView1<f64>, n_features: usize) -> Array2<f64> {
        let keep = self.rows.len().min(self.capacity - 1);
        let skip = self.rows.len() - keep;
        let mut out = Array2::zeros((keep + 1, n_features));
        for (mut dst, src) in out.rows_mut().into_iter().zip(self.rows.iter().skip(skip)) {
            dst.assign(src);
        }
        out.row_mut(keep).assign(&row);
        out
    }
}
