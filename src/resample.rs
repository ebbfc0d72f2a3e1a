//! FFT resampling of raw batches.
//!
//! [`Resample`] is the interface the run calls after channel selection.
//! [`FftResampler`] is the default implementation:
//!
//! 1. reflect-limited padding to the next power of two (see [`auto_npad`]),
//! 2. real FFT of the padded signal,
//! 3. Nyquist bin doubled (down) or halved (up) when the shorter length is even,
//! 4. spectrum scaled by `new_len / old_len` and truncated or zero-padded,
//! 5. inverse FFT and removal of the resampled padding.
//!
//! Every batch is resampled on its own; nothing is carried between calls.
use anyhow::{ensure, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Rate conversion of a `[C, T]` batch.
pub trait Resample {
    /// Rate of the returned batches.
    fn target_rate(&self) -> f64;

    fn apply(&self, batch: ArrayView2<f64>) -> Result<Array2<f64>>;
}

/// Resample every batch from `src_sfreq` to `dst_sfreq`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FftResampler {
    src_sfreq: f64,
    dst_sfreq: f64,
}

impl FftResampler {
    pub fn new(src_sfreq: f64, dst_sfreq: f64) -> Self {
        Self { src_sfreq, dst_sfreq }
    }

    pub fn is_identity(&self) -> bool {
        (self.src_sfreq - self.dst_sfreq).abs() < 1e-6
    }
}

impl Resample for FftResampler {
    fn target_rate(&self) -> f64 {
        self.dst_sfreq
    }

    fn apply(&self, batch: ArrayView2<f64>) -> Result<Array2<f64>> {
        resample(batch, self.src_sfreq, self.dst_sfreq)
    }
}

/// Padding to the next power of two:
///
/// ```text
/// min_add = min(n / 8, 100) * 2
/// total   = 2^ceil(log2(n + min_add)) - n
/// ```
///
/// returned as `(total / 2, total - total / 2)`.
pub fn auto_npad(n: usize) -> (usize, usize) {
    let min_add = (n / 8).min(100) * 2;
    let total = (n + min_add).next_power_of_two() - n;
    (total / 2, total - total / 2)
}

/// Resample `data` (`[C, T]`) from `src_sfreq` to `dst_sfreq`.
///
/// The output has `round(T * dst / src)` columns.
pub fn resample(data: ArrayView2<f64>, src_sfreq: f64, dst_sfreq: f64) -> Result<Array2<f64>> {
    ensure!(
        src_sfreq > 0.0 && dst_sfreq > 0.0,
        "sampling rates must be positive (src={src_sfreq}, dst={dst_sfreq})"
    );
    if (src_sfreq - dst_sfreq).abs() < 1e-6 {
        return Ok(data.to_owned());
    }
    let ratio = dst_sfreq / src_sfreq;
    let n_in = data.ncols();
    let n_out = (ratio * n_in as f64).round() as usize;
    let npad = auto_npad(n_in);

    let mut planner = FftPlanner::<f64>::new();
    let mut out = Array2::<f64>::zeros((data.nrows(), n_out));
    for (mut dst, src) in out.rows_mut().into_iter().zip(data.rows()) {
        let y = resample_lane(src, ratio, npad, &mut planner);
        dst.iter_mut().zip(y).for_each(|(d, v)| *d = v);
    }
    Ok(out)
}

fn resample_lane(
    x: ArrayView1<f64>,
    ratio: f64,
    (npad_l, npad_r): (usize, usize),
    planner: &mut FftPlanner<f64>,
) -> Vec<f64> {
    let n = x.len();
    let n_out = (ratio * n as f64).round() as usize;
    if n == 0 {
        return vec![];
    }

    let pad_l = npad_l.min(n - 1);
    let pad_r = npad_r.min(n - 1);
    let first = x[0];
    let last = x[n - 1];
    let padded: Vec<f64> = (1..=pad_l)
        .rev()
        .map(|i| 2.0 * first - x[i])
        .chain(x.iter().copied())
        .chain((1..=pad_r).map(|i| 2.0 * last - x[n - 1 - i]))
        .collect();
    let old_len = padded.len();
    let new_len = (ratio * old_len as f64).round() as usize;
    if new_len == 0 {
        return vec![0.0; n_out];
    }

    let mut spectrum: Vec<Complex<f64>> = padded.iter().map(|&v| Complex::new(v, 0.0)).collect();
    planner.plan_fft_forward(old_len).process(&mut spectrum);
    spectrum.truncate(old_len / 2 + 1);

    let shorter = new_len < old_len;
    let use_len = if shorter { new_len } else { old_len };
    if use_len % 2 == 0 && use_len / 2 < spectrum.len() {
        spectrum[use_len / 2] *= if shorter { 2.0 } else { 0.5 };
    }

    // Hermitian spectrum of length new_len, scaled for the length change and
    // for the unnormalised inverse transform.
    let scale = (new_len as f64 / old_len as f64) / new_len as f64;
    let half = new_len / 2 + 1;
    let mut full = vec![Complex::<f64>::default(); new_len];
    for (k, v) in spectrum.iter().take(half).enumerate() {
        full[k] = *v * scale;
    }
    for k in 1..half {
        let mirror = new_len - k;
        if mirror >= half {
            full[mirror] = full[k].conj();
        }
    }
    planner.plan_fft_inverse(new_len).process(&mut full);

    let cut_l = (ratio * npad_l as f64).round() as usize;
    let mut y: Vec<f64> = full
        .iter()
        .skip(cut_l)
        .take(n_out)
        .map(|c| c.re)
        .collect();
    y.resize(n_out, 0.0);
    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn identity_rate_passthrough() {
        let data = Array2::from_shape_fn((2, 512), |(_, t)| t as f64 / 512.0);
        let out = resample(data.view(), 256.0, 256.0).unwrap();
        assert_eq!(out, data);
        assert!(FftResampler::new(256.0, 256.0).is_identity());
    }

    #[test]
    fn half_rate_length() {
        let data = Array2::zeros((1, 1024));
        let out = resample(data.view(), 512.0, 256.0).unwrap();
        assert_eq!(out.ncols(), 512);
    }

    #[test]
    fn dc_is_preserved() {
        let data = Array2::from_elem((1, 1000), 3.25);
        for (src, dst) in [(1000.0, 250.0), (1000.0, 400.0), (250.0, 1000.0)] {
            let out = FftResampler::new(src, dst).apply(data.view()).unwrap();
            for &v in out.iter() {
                approx::assert_abs_diff_eq!(v, 3.25, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn slow_sine_survives_downsampling() {
        let fs = 1000.0;
        let data = Array2::from_shape_fn((1, 2000), |(_, t)| {
            (2.0 * std::f64::consts::PI * 5.0 * t as f64 / fs).sin()
        });
        let out = resample(data.view(), fs, 200.0).unwrap();
        assert_eq!(out.ncols(), 400);
        for (t, &v) in out.iter().enumerate().skip(20).take(360) {
            let expected = (2.0 * std::f64::consts::PI * 5.0 * t as f64 / 200.0).sin();
            approx::assert_abs_diff_eq!(v, expected, epsilon = 1e-2);
        }
    }

    #[test]
    fn auto_npad_powers_of_two() {
        assert_eq!(auto_npad(15360), (512, 512));
        assert_eq!(auto_npad(30720), (1024, 1024));
    }
}
