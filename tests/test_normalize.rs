mod common;
use common::noise;

use approx::assert_abs_diff_eq;
use ndarray::{arr1, arr2, s, Array2, Axis};
use nmstream::{normalize_features, normalize_raw, FeatureHistory, NormMethod, RawHistory};

#[test]
fn zscore_against_own_window_has_zero_mean_unit_std() {
    let x = noise(3, 200, 1).mapv(|v| 5.0 + 2.0 * v);
    let y = normalize_raw(x.view(), x.view(), NormMethod::Zscore, None);
    for row in y.rows() {
        let mean = row.mean().unwrap();
        let std = row.std(0.0);
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(std, 1.0, epsilon = 1e-10);
    }
}

#[test]
fn median_is_robust_to_outliers() {
    let window = arr2(&[[1.0, 2.0, 3.0, 1000.0, 4.0]]);
    let data = arr2(&[[3.0, 10.0]]);
    let y = normalize_raw(data.view(), window.view(), NormMethod::Median, None);
    assert_eq!(y, arr2(&[[0.0, 7.0]]));
}

#[test]
fn clip_bounds_every_method() {
    let window = noise(2, 50, 4);
    let data = window.mapv(|v| v * 1e3);
    for method in [NormMethod::Mean, NormMethod::Median, NormMethod::Zscore] {
        let y = normalize_raw(data.view(), window.view(), method, Some(2.0));
        assert!(y.iter().all(|v| v.abs() <= 2.0), "{method:?} exceeds clip");
    }
}

#[test]
fn features_use_the_window_columns() {
    let window = arr2(&[[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]]);
    let y = normalize_features(arr1(&[5.0, 12.0]).view(), window.view(), NormMethod::Zscore, None);
    // column 0: mean 3, std sqrt(8/3); column 1 has zero variance.
    assert_abs_diff_eq!(y[0], 2.0 / (8.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
    assert_eq!(y[1], 0.0);
}

#[test]
fn raw_history_keeps_the_most_recent_samples() {
    let x = Array2::from_shape_fn((2, 23), |(c, t)| (c * 100 + t) as f64);
    let mut h = RawHistory::new(2, 8);
    for chunk in x.axis_chunks_iter(Axis(1), 5) {
        h.push(chunk);
    }
    assert_eq!(h.len(), 8);
    assert_eq!(h.window(), x.slice(s![.., 15..]));
}

#[test]
fn feature_history_window_is_oldest_first() {
    let mut h = FeatureHistory::new(3);
    for i in 0..5 {
        h.push(arr1(&[i as f64, -(i as f64)]).view());
    }
    assert_eq!(h.len(), 3);
    let preview = h.window_with(arr1(&[9.0, -9.0]).view(), 2);
    assert_eq!(preview, arr2(&[[3.0, -3.0], [4.0, -4.0], [9.0, -9.0]]));
    assert_eq!(h.len(), 3);
}
