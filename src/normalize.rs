//! Rolling-window normalization of raw samples and feature rows.
//!
//! Both routines share one algorithm. For every channel (raw) or feature
//! column (features) a statistic is taken over the window:
//!
//! ```text
//! mean    x' = x − mean(w)
//! median  x' = x − median(w)
//! zscore  x' = (x − mean(w)) / std(w)      std with ddof = 0, x' = 0 if std = 0
//! ```
//!
//! then `x'` is clamped to `[−clip, clip]` when a clip bound is given.
//! A window shorter than the configured length is not an error: callers pass
//! whatever history is available. An empty window yields zeros.
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};

use crate::settings::NormMethod;

/// Location and (for z-score) scale of one window lane.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LaneStats {
    center: f64,
    std: f64,
}

fn lane_stats(lane: ArrayView1<f64>, method: NormMethod) -> LaneStats {
    // A constant lane is centred on its exact value: the float mean of e.g.
    // 0.1 is off by a few ULPs and would leave a residue of the same order.
    let (min, max) = lane
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if min == max {
        return LaneStats {
            center: min,
            std: if method == NormMethod::Zscore { 0.0 } else { 1.0 },
        };
    }
    let n = lane.len() as f64;
    match method {
        NormMethod::Mean => LaneStats {
            center: lane.sum() / n,
            std: 1.0,
        },
        NormMethod::Median => LaneStats {
            center: median(lane),
            std: 1.0,
        },
        NormMethod::Zscore => {
            let mean = lane.sum() / n;
            let var = lane.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
            LaneStats {
                center: mean,
                std: var.sqrt(),
            }
        }
    }
}

fn median(lane: ArrayView1<f64>) -> f64 {
    let mut v: Vec<f64> = lane.to_vec();
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    }
}

#[inline]
fn apply(x: f64, st: LaneStats, clip: Option<f64>) -> f64 {
    if st.std == 0.0 {
        return 0.0;
    }
    let y = (x - st.center) / st.std;
    match clip {
        Some(c) => y.clamp(-c, c),
        None => y,
    }
}

/// Normalize a raw batch `[C, T]` against a history window `[C, W]`.
///
/// Statistics are computed per channel over `window`; the returned array has
/// the shape of `data`.
pub fn normalize_raw(
    data: ArrayView2<f64>,
    window: ArrayView2<f64>,
    method: NormMethod,
    clip: Option<f64>,
) -> Array2<f64> {
    assert_eq!(data.nrows(), window.nrows(), "channel count of data and window differ");
    let mut out = Array2::<f64>::zeros(data.raw_dim());
    if window.ncols() == 0 {
        return out;
    }
    Zip::from(out.rows_mut())
        .and(data.rows())
        .and(window.rows())
        .for_each(|mut o, x, w| {
            let st = lane_stats(w, method);
            Zip::from(&mut o).and(&x).for_each(|o, &x| *o = apply(x, st, clip));
        });
    out
}

/// Normalize one feature row `[F]` against a history window `[R, F]`
/// (rows = past batches, oldest first).
pub fn normalize_features(
    row: ArrayView1<f64>,
    window: ArrayView2<f64>,
    method: NormMethod,
    clip: Option<f64>,
) -> Array1<f64> {
    assert_eq!(row.len(), window.ncols(), "feature count of row and window differ");
    if window.nrows() == 0 {
        return Array1::zeros(row.len());
    }
    let mut out = Array1::<f64>::zeros(row.len());
    Zip::from(&mut out)
        .and(&row)
        .and(window.columns())
        .for_each(|o, &x, col| *o = apply(x, lane_stats(col, method), clip));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array2};

    const METHODS: [NormMethod; 3] = [NormMethod::Mean, NormMethod::Median, NormMethod::Zscore];

    #[test]
    fn constant_window_gives_zero() {
        let window = Array2::from_elem((3, 64), 7.5);
        for method in METHODS {
            let out = normalize_raw(window.view(), window.view(), method, None);
            for &v in out.iter() {
                assert_eq!(v, 0.0, "{method:?}");
            }
            let hist = Array2::from_elem((5, 4), -2.0);
            let row = arr1(&[-2.0, -2.0, -2.0, -2.0]);
            let f = normalize_features(row.view(), hist.view(), method, Some(1.0));
            assert!(f.iter().all(|&v| v == 0.0), "{method:?}");
        }
    }

    #[test]
    fn inexact_constant_window_gives_zero() {
        for value in [0.1, 1.0 / 3.0, -0.7] {
            let window = Array2::from_elem((2, 3), value);
            let hist = Array2::from_elem((3, 2), value);
            let row = arr1(&[value, value]);
            for method in METHODS {
                let out = normalize_raw(window.view(), window.view(), method, None);
                assert!(out.iter().all(|&v| v == 0.0), "{method:?} {value}: {out}");
                let f = normalize_features(row.view(), hist.view(), method, None);
                assert!(f.iter().all(|&v| v == 0.0), "{method:?} {value}: {f}");
            }
        }
    }

    #[test]
    fn constant_window_keeps_offset_for_mean_and_median() {
        let window = Array2::from_elem((1, 4), 0.1);
        let data = arr2(&[[0.3]]);
        for method in [NormMethod::Mean, NormMethod::Median] {
            let out = normalize_raw(data.view(), window.view(), method, None);
            approx::assert_abs_diff_eq!(out[[0, 0]], 0.2, epsilon = 1e-12);
        }
        let z = normalize_raw(data.view(), window.view(), NormMethod::Zscore, None);
        assert_eq!(z[[0, 0]], 0.0);
    }

    #[test]
    fn median_even_window_averages_middle() {
        let window = arr2(&[[1.0, 9.0, 3.0, 4.0]]);
        let data = arr2(&[[3.5, 10.0]]);
        let out = normalize_raw(data.view(), window.view(), NormMethod::Median, None);
        approx::assert_abs_diff_eq!(out[[0, 0]], 0.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(out[[0, 1]], 6.5, epsilon = 1e-12);
    }

    #[test]
    fn zscore_uses_population_std() {
        // mean 2, var ((1 + 1) / 2) = 1
        let window = arr2(&[[1.0, 3.0]]);
        let data = arr2(&[[5.0]]);
        let out = normalize_raw(data.view(), window.view(), NormMethod::Zscore, None);
        approx::assert_abs_diff_eq!(out[[0, 0]], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_variance_only_zeroes_that_column() {
        let hist = arr2(&[[1.0, 4.0], [1.0, 0.0]]);
        let row = arr1(&[1.0, 0.0]);
        let out = normalize_features(row.view(), hist.view(), NormMethod::Zscore, None);
        assert_eq!(out[0], 0.0);
        approx::assert_abs_diff_eq!(out[1], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn clip_bounds_every_element() {
        let window = Array2::from_shape_fn((4, 50), |(c, t)| ((c * 31 + t * 7) % 13) as f64);
        let data = Array2::from_shape_fn((4, 20), |(c, t)| (c as f64 - 2.0) * 40.0 + t as f64);
        for method in METHODS {
            let out = normalize_raw(data.view(), window.view(), method, Some(1.5));
            assert!(out.iter().all(|v| (-1.5..=1.5).contains(v)), "{method:?}");
        }
    }

    #[test]
    fn empty_window_yields_zeros() {
        let window = Array2::<f64>::zeros((2, 0));
        let data = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let out = normalize_raw(data.view(), window.view(), NormMethod::Mean, None);
        assert!(out.iter().all(|&v| v == 0.0));
    }
}
